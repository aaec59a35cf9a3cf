//! Channel trait.
//!
//! The [`Channel`] trait abstracts the message queue connecting the host
//! simulator to its peer process. Implementations own the wire and memory
//! layout; the bridge only relies on the operations below:
//! - connect / close the endpoint
//! - non-blocking receive gated by a timestamp bound
//! - two-phase send: reserve a slot, then commit a timestamped message
//!
//! Two-phase sending is what makes backpressure lossless for the channel:
//! a sender that cannot reserve a slot has written nothing.

use cosim_types::{SimTime, SyncMode};

use crate::{ChannelError, Message};

/// Parameters for connecting one endpoint of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Rendezvous path shared by both peers.
    pub path: String,
    /// Timing discipline this side requests.
    pub sync_mode: SyncMode,
    /// Maximum gap between two outgoing messages.
    pub sync_interval: SimTime,
    /// Delay added to every outgoing timestamp.
    pub link_latency: SimTime,
}

impl ConnectParams {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sync_mode: SyncMode::default(),
            sync_interval: SimTime::from_nanos(500),
            link_latency: SimTime::from_nanos(500),
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }
}

/// A reserved slot in the outgoing queue.
///
/// Obtained from [`Channel::alloc_send_slot`] and consumed by
/// [`Channel::commit`].
#[derive(Debug)]
#[must_use = "a reserved slot must be committed"]
pub struct SendSlot {
    sequence: u64,
}

impl SendSlot {
    pub fn new(sequence: u64) -> Self {
        Self { sequence }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Bidirectional, timestamped message queue to the peer simulator.
///
/// The handle is exclusively owned by its caller and must be released with
/// [`Channel::close`].
pub trait Channel {
    /// Per-connection state.
    type Handle;

    /// Connects one endpoint.
    fn connect(&self, params: &ConnectParams) -> Result<Self::Handle, ChannelError>;

    /// Takes the next inbound message if its timestamp is at most `until`.
    ///
    /// Never blocks. Returns [`ChannelError::Disconnected`] once the peer
    /// has closed and every message it sent has been consumed.
    fn poll(
        &self,
        handle: &mut Self::Handle,
        until: SimTime,
    ) -> Result<Option<Message>, ChannelError>;

    /// Timestamp of the next inbound message, without consuming it.
    fn next_timestamp(&self, handle: &mut Self::Handle) -> Result<Option<SimTime>, ChannelError>;

    /// Blocks until at least one inbound message is available.
    ///
    /// Used by lockstep receivers that have run out of known-safe time.
    fn wait_readable(&self, handle: &mut Self::Handle) -> Result<(), ChannelError>;

    /// Reserves room for one outgoing message; `None` if the queue is full.
    fn alloc_send_slot(&self, handle: &mut Self::Handle) -> Result<Option<SendSlot>, ChannelError>;

    /// Publishes `message` into a previously reserved slot.
    fn commit(
        &self,
        handle: &mut Self::Handle,
        slot: SendSlot,
        message: Message,
    ) -> Result<(), ChannelError>;

    /// Closes the endpoint.
    fn close(&self, handle: Self::Handle) -> Result<(), ChannelError>;
}
