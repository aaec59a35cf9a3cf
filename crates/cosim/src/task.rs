//! Events devices put on the host timeline.

use bytes::Bytes;
use cosim_types::{DeviceId, MacAddress};

/// Work for one device, dispatched by the [`Host`](crate::Host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTask {
    pub device: DeviceId,
    pub event: LinkEvent,
}

impl LinkTask {
    pub fn new(device: DeviceId, event: LinkEvent) -> Self {
        Self { device, event }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Poll timer: drain the channel.
    Poll,
    /// Sync timer: send a heartbeat.
    SyncTick,
    /// Inbound frame re-entering the owning node's execution slot.
    Receive(Bytes),
    /// Application send scheduled on the timeline.
    Send(OutgoingFrame),
}

/// A payload queued for [`NetDevice::send_from`](crate::NetDevice::send_from).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub payload: Bytes,
    /// Defaults to the device's own address.
    pub source: Option<MacAddress>,
    pub destination: MacAddress,
    pub protocol: u16,
}

impl OutgoingFrame {
    pub fn new(payload: impl Into<Bytes>, destination: MacAddress, protocol: u16) -> Self {
        Self {
            payload: payload.into(),
            source: None,
            destination,
            protocol,
        }
    }

    pub fn with_source(mut self, source: MacAddress) -> Self {
        self.source = Some(source);
        self
    }
}
