//! Messages exchanged over a channel.

use bytes::Bytes;
use cosim_types::SimTime;

/// What a message carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// A raw Ethernet-style frame, header included.
    Data(Bytes),
    /// Content-free heartbeat: "nothing earlier than this timestamp follows".
    Sync,
}

/// A timestamped channel message.
///
/// The timestamp is the receiver-side delivery time: the sender's clock at
/// commit plus the link latency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub timestamp: SimTime,
    pub kind: MessageKind,
}

impl Message {
    pub fn data(timestamp: SimTime, frame: Bytes) -> Self {
        Self {
            timestamp,
            kind: MessageKind::Data(frame),
        }
    }

    pub fn sync(timestamp: SimTime) -> Self {
        Self {
            timestamp,
            kind: MessageKind::Sync,
        }
    }

    pub fn is_sync(&self) -> bool {
        matches!(self.kind, MessageKind::Sync)
    }

    /// Payload length in bytes (zero for heartbeats).
    pub fn len(&self) -> usize {
        match &self.kind {
            MessageKind::Data(frame) => frame.len(),
            MessageKind::Sync => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
