//! DeviceShim: the peer simulator presented as an ordinary interface.
//!
//! Outbound payloads get the Ethernet header prepended and go to the
//! [`Adapter`]. Inbound frames arrive from the adapter outside any node's
//! execution slot; [`adapter_rx`] defers them into the owning node's slot
//! at the current instant, where [`DeviceShim::rx_in_context`] strips the
//! header, classifies the destination and fans the frame out.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use bytes::Bytes;
use cosim_channel::Channel;
use cosim_config::LinkEndpointConfig;
use cosim_sim::{Priority, Scheduler};
use cosim_types::{DeviceId, MacAddress, NodeId, SimTime};

use crate::adapter::{Adapter, AdapterState, AdapterStats};
use crate::classify::PacketType;
use crate::error::{LinkError, TransmitError};
use crate::header::EthernetHeader;
use crate::net_device::{
    DEFAULT_MTU, LinkChangeCallback, NetDevice, PromiscReceiveCallback, ReceiveCallback,
    ReceivedFrame,
};
use crate::task::{LinkEvent, LinkTask};
use crate::trace::{TracePoint, TraceSink, trace_context};

/// Defers an inbound frame into `node`'s execution slot at the current
/// instant.
pub fn adapter_rx(
    device: DeviceId,
    node: NodeId,
    frame: Bytes,
    sched: &mut dyn Scheduler<LinkTask>,
) {
    sched.schedule_with_context(
        node,
        SimTime::ZERO,
        Priority::Normal,
        LinkTask::new(device, LinkEvent::Receive(frame)),
    );
}

pub struct DeviceShim<C: Channel> {
    id: DeviceId,
    node: NodeId,
    if_index: u32,
    address: MacAddress,
    mtu: u16,
    adapter: Adapter<C>,
    rx_callback: Option<ReceiveCallback>,
    promisc_callback: Option<PromiscReceiveCallback>,
    trace: Arc<dyn TraceSink>,
    context: String,
}

impl<C: Channel> DeviceShim<C> {
    pub fn new(
        id: DeviceId,
        node: NodeId,
        address: MacAddress,
        channel: C,
        trace: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            id,
            node,
            if_index: 0,
            address,
            mtu: DEFAULT_MTU,
            adapter: Adapter::new(channel, id),
            rx_callback: None,
            promisc_callback: None,
            trace,
            context: trace_context(node, 0),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn state(&self) -> AdapterState {
        self.adapter.state()
    }

    pub fn adapter(&self) -> &Adapter<C> {
        &self.adapter
    }

    pub fn stats(&self) -> AdapterStats {
        self.adapter.stats()
    }

    /// Trace context string, `node/<node>/device/<ifindex>`.
    pub fn trace_context(&self) -> &str {
        &self.context
    }

    /// Binds the endpoint configuration and connects to the peer.
    ///
    /// # Panics
    ///
    /// Panics if the device was already started or has no receive callback.
    pub fn start(
        &mut self,
        config: LinkEndpointConfig,
        sched: &mut dyn Scheduler<LinkTask>,
    ) -> Result<(), LinkError> {
        assert!(
            self.rx_callback.is_some(),
            "device {} started without a receive callback",
            self.id
        );

        let (device, node) = (self.id, self.node);
        self.adapter
            .set_receive_callback(Box::new(move |frame, sched| {
                adapter_rx(device, node, frame, sched);
            }));
        self.adapter.start(config, sched)
    }

    pub fn stop(&mut self, sched: &mut dyn Scheduler<LinkTask>) {
        self.adapter.stop(sched);
    }

    pub fn poll(&mut self, sched: &mut dyn Scheduler<LinkTask>) -> Result<(), LinkError> {
        self.adapter.poll(sched)
    }

    pub fn sync_tick(&mut self, sched: &mut dyn Scheduler<LinkTask>) -> Result<(), LinkError> {
        self.adapter.on_sync_tick(sched)
    }

    /// Handles an inbound frame inside the owning node's execution slot.
    ///
    /// # Panics
    ///
    /// Panics unless the device is started.
    pub fn rx_in_context(&mut self, frame: Bytes, now: SimTime) {
        assert_eq!(
            self.state(),
            AdapterState::Started,
            "device {} received a frame while not started",
            self.id
        );

        let (header, payload) = match EthernetHeader::decapsulate(&frame) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::debug!(device = %self.id, error = %e, "undersized frame");
                self.trace.record(TracePoint::Drop, &self.context, &frame);
                return;
            }
        };
        self.trace
            .record(TracePoint::RxFromAdapter, &self.context, &frame);
        self.trace
            .record(TracePoint::TxToNetwork, &self.context, &frame);

        let packet_type = PacketType::classify(header.destination, self.address);
        let received = ReceivedFrame {
            time: now,
            payload,
            protocol: header.ether_type,
            source: header.source,
            destination: header.destination,
            packet_type,
        };

        tracing::trace!(
            device = %self.id,
            source = %received.source,
            destination = %received.destination,
            protocol = received.protocol,
            %packet_type,
            "frame received"
        );

        if let Some(observer) = self.promisc_callback.as_mut() {
            observer(&received);
        }
        if packet_type.is_for_us() {
            if let Some(consumer) = self.rx_callback.as_mut() {
                consumer(&received);
            }
        }
    }
}

impl<C: Channel> NetDevice for DeviceShim<C> {
    fn if_index(&self) -> u32 {
        self.if_index
    }

    fn set_if_index(&mut self, index: u32) {
        self.if_index = index;
        self.context = trace_context(self.node, index);
    }

    fn channel(&self) -> Option<u32> {
        None
    }

    fn address(&self) -> MacAddress {
        self.address
    }

    fn set_address(&mut self, address: MacAddress) {
        self.address = address;
    }

    fn mtu(&self) -> u16 {
        self.mtu
    }

    fn set_mtu(&mut self, mtu: u16) -> bool {
        self.mtu = mtu;
        true
    }

    // The peer owns the physical link; from here it is always up.
    fn is_link_up(&self) -> bool {
        true
    }

    // Link never changes state, so there is nothing to notify.
    fn add_link_change_callback(&mut self, _callback: LinkChangeCallback) {}

    fn is_broadcast(&self) -> bool {
        true
    }

    fn broadcast(&self) -> MacAddress {
        MacAddress::BROADCAST
    }

    fn is_multicast(&self) -> bool {
        true
    }

    fn multicast_ipv4(&self, group: Ipv4Addr) -> MacAddress {
        MacAddress::multicast_for_ipv4(group)
    }

    fn multicast_ipv6(&self, addr: Ipv6Addr) -> MacAddress {
        MacAddress::multicast_for_ipv6(addr)
    }

    fn is_bridge(&self) -> bool {
        false
    }

    fn is_point_to_point(&self) -> bool {
        false
    }

    fn needs_arp(&self) -> bool {
        true
    }

    fn supports_send_from(&self) -> bool {
        true
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn send_from(
        &mut self,
        payload: Bytes,
        source: MacAddress,
        destination: MacAddress,
        protocol: u16,
        sched: &mut dyn Scheduler<LinkTask>,
    ) -> Result<(), TransmitError> {
        assert_eq!(
            self.state(),
            AdapterState::Started,
            "device {} cannot send while not started",
            self.id
        );

        self.trace
            .record(TracePoint::RxFromNetwork, &self.context, &payload);

        let frame = EthernetHeader::new(destination, source, protocol).encapsulate(&payload);
        self.trace
            .record(TracePoint::TxToAdapter, &self.context, &frame);

        let result = self.adapter.transmit(frame.clone(), sched);
        if result.is_err() {
            self.trace.record(TracePoint::Drop, &self.context, &frame);
        }
        result
    }

    fn set_receive_callback(&mut self, callback: ReceiveCallback) {
        self.rx_callback = Some(callback);
    }

    fn set_promisc_receive_callback(&mut self, callback: PromiscReceiveCallback) {
        self.promisc_callback = Some(callback);
    }
}
