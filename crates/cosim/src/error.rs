//! Error types for the bridge device and its host glue.

use cosim_channel::ChannelError;
use cosim_config::ConfigError;
use cosim_sim::SimError;
use cosim_types::DeviceId;

/// Errors that end a device's connection to its peer.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Endpoint configuration rejected at start.
    #[error("invalid link configuration: {0}")]
    Config(#[from] ConfigError),

    /// The channel could not be opened.
    #[error("failed to connect channel {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: ChannelError,
    },

    /// The open channel failed; there is no reconnection.
    #[error("channel failure: {0}")]
    Channel(#[from] ChannelError),
}

/// Why a frame was not handed to the peer.
#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    /// No free send slot. Nothing was written; the frame is dropped.
    #[error("channel full, frame dropped")]
    ChannelFull,

    /// The channel failed while sending.
    #[error("channel failure while sending: {0}")]
    Channel(#[from] ChannelError),
}

impl TransmitError {
    /// Backpressure is expected under load; anything else ends the link.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ChannelFull)
    }
}

/// Errors that end a [`Host`](crate::Host) run.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("device {device}: {source}")]
    Link {
        device: DeviceId,
        #[source]
        source: LinkError,
    },

    #[error("device {device}: {source}")]
    Transmit {
        device: DeviceId,
        #[source]
        source: TransmitError,
    },

    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),

    #[error(transparent)]
    Sim(#[from] SimError),
}
