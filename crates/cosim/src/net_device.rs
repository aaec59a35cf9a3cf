//! Network device capability surface.
//!
//! What the simulated stack expects from any interface: addressing,
//! link properties, transmission and receive hooks.

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;
use cosim_sim::Scheduler;
use cosim_types::{MacAddress, NodeId, SimTime};

use crate::classify::PacketType;
use crate::error::TransmitError;
use crate::task::LinkTask;

/// Ethernet MTU.
pub const DEFAULT_MTU: u16 = 1500;

/// A frame delivered to a consumer, header removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Simulated time of delivery.
    pub time: SimTime,
    pub payload: Bytes,
    pub protocol: u16,
    pub source: MacAddress,
    pub destination: MacAddress,
    pub packet_type: PacketType,
}

/// Primary consumer; sees frames classified host, broadcast or multicast.
pub type ReceiveCallback = Box<dyn FnMut(&ReceivedFrame)>;

/// Promiscuous observer; sees every frame.
pub type PromiscReceiveCallback = Box<dyn FnMut(&ReceivedFrame)>;

/// Invoked when the link goes up or down.
pub type LinkChangeCallback = Box<dyn FnMut()>;

pub trait NetDevice {
    fn if_index(&self) -> u32;
    fn set_if_index(&mut self, index: u32);

    /// Simulator channel the device is attached to, if any.
    fn channel(&self) -> Option<u32>;

    fn address(&self) -> MacAddress;
    fn set_address(&mut self, address: MacAddress);

    fn mtu(&self) -> u16;
    /// Returns `true` once the value is applied.
    fn set_mtu(&mut self, mtu: u16) -> bool;

    fn is_link_up(&self) -> bool;
    fn add_link_change_callback(&mut self, callback: LinkChangeCallback);

    fn is_broadcast(&self) -> bool;
    fn broadcast(&self) -> MacAddress;

    fn is_multicast(&self) -> bool;
    fn multicast_ipv4(&self, group: Ipv4Addr) -> MacAddress;
    fn multicast_ipv6(&self, addr: Ipv6Addr) -> MacAddress;

    fn is_bridge(&self) -> bool;
    fn is_point_to_point(&self) -> bool;
    fn needs_arp(&self) -> bool;
    fn supports_send_from(&self) -> bool;

    fn node(&self) -> NodeId;

    /// Sends `payload` from the device's own address.
    fn send(
        &mut self,
        payload: Bytes,
        destination: MacAddress,
        protocol: u16,
        sched: &mut dyn Scheduler<LinkTask>,
    ) -> Result<(), TransmitError> {
        let source = self.address();
        self.send_from(payload, source, destination, protocol, sched)
    }

    fn send_from(
        &mut self,
        payload: Bytes,
        source: MacAddress,
        destination: MacAddress,
        protocol: u16,
        sched: &mut dyn Scheduler<LinkTask>,
    ) -> Result<(), TransmitError>;

    fn set_receive_callback(&mut self, callback: ReceiveCallback);
    fn set_promisc_receive_callback(&mut self, callback: PromiscReceiveCallback);
}
