//! Channel error types.

use cosim_types::SyncMode;

/// Errors from a channel implementation.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Connect parameters were rejected before touching the endpoint.
    #[error("invalid connect parameters: {0}")]
    InvalidParams(String),

    /// A third endpoint tried to join a point-to-point channel.
    #[error("channel {path} already has two peers")]
    PeerCountMismatch { path: String },

    /// The two ends disagree on the timing discipline.
    #[error("sync mode mismatch on {path}: local {local}, peer {peer}")]
    SyncModeMismatch {
        path: String,
        local: SyncMode,
        peer: SyncMode,
    },

    /// The peer closed its side and everything it sent has been consumed.
    #[error("peer disconnected from {path}")]
    Disconnected { path: String },

    /// Waiting for the peer cannot make progress from this process.
    #[error("waiting for peer on {path} would stall the simulation")]
    WouldStall { path: String },

    /// `commit` was called without a matching `alloc_send_slot`.
    #[error("commit without a reserved send slot on {path}")]
    SlotNotReserved { path: String },

    /// Underlying OS I/O error (out-of-process transports).
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl ChannelError {
    /// Returns `true` for errors after which the connection is unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidParams(_))
    }
}
