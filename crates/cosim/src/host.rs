//! Host: the event loop driving bridged devices.
//!
//! The host owns a [`Simulation`] of [`LinkTask`]s and the devices those
//! tasks address. Each dispatched task is routed to its device together
//! with the simulation, which the device uses as its [`Scheduler`].

use std::sync::Arc;

use cosim_channel::Channel;
use cosim_config::LinkEndpointConfig;
use cosim_sim::{EventId, Priority, Scheduler, SimConfig, SimSummary, Simulation};
use cosim_types::{DeviceId, MacAddress, NodeId, SimTime};

use crate::adapter::AdapterState;
use crate::device::DeviceShim;
use crate::error::{HostError, TransmitError};
use crate::net_device::NetDevice;
use crate::task::{LinkEvent, LinkTask, OutgoingFrame};
use crate::trace::{TraceSink, TracingSink};

pub struct Host<C: Channel> {
    sim: Simulation<LinkTask>,
    devices: Vec<DeviceShim<C>>,
    trace: Arc<dyn TraceSink>,
}

impl<C: Channel> Host<C> {
    pub fn new(config: SimConfig) -> Self {
        Self {
            sim: Simulation::new(config),
            devices: Vec::new(),
            trace: Arc::new(TracingSink),
        }
    }

    /// Trace sink handed to devices added from now on.
    pub fn with_trace_sink(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    pub fn now(&self) -> SimTime {
        self.sim.now()
    }

    pub fn simulation(&self) -> &Simulation<LinkTask> {
        &self.sim
    }

    pub fn summary(&self) -> SimSummary {
        self.sim.summary()
    }

    /// Attaches a new device to `node`.
    ///
    /// Interface indexes count devices per node, starting at 0.
    pub fn add_device(&mut self, node: NodeId, address: MacAddress, channel: C) -> DeviceId {
        let id = DeviceId::new(self.devices.len() as u32);
        let if_index = self
            .devices
            .iter()
            .filter(|device| device.node() == node)
            .count() as u32;

        let mut device = DeviceShim::new(id, node, address, channel, Arc::clone(&self.trace));
        device.set_if_index(if_index);
        self.devices.push(device);

        tracing::debug!(device = %id, node = %node, %address, if_index, "device added");
        id
    }

    pub fn device(&self, id: DeviceId) -> Result<&DeviceShim<C>, HostError> {
        self.devices.get(id.index()).ok_or(HostError::UnknownDevice(id))
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Result<&mut DeviceShim<C>, HostError> {
        self.devices
            .get_mut(id.index())
            .ok_or(HostError::UnknownDevice(id))
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceShim<C>> {
        self.devices.iter()
    }

    /// Starts one device at the current simulated time.
    pub fn start_device(
        &mut self,
        id: DeviceId,
        config: LinkEndpointConfig,
    ) -> Result<(), HostError> {
        let device = self
            .devices
            .get_mut(id.index())
            .ok_or(HostError::UnknownDevice(id))?;
        self.sim.enter_context(device.node());
        let result = device.start(config, &mut self.sim);
        self.sim.enter_context(NodeId::NONE);
        result.map_err(|source| HostError::Link { device: id, source })
    }

    pub fn stop_device(&mut self, id: DeviceId) -> Result<(), HostError> {
        let device = self
            .devices
            .get_mut(id.index())
            .ok_or(HostError::UnknownDevice(id))?;
        device.stop(&mut self.sim);
        Ok(())
    }

    pub fn stop_all(&mut self) {
        for device in &mut self.devices {
            device.stop(&mut self.sim);
        }
    }

    /// Sends a frame from `device` at the current simulated time.
    pub fn send(&mut self, id: DeviceId, frame: OutgoingFrame) -> Result<(), HostError> {
        let device = self
            .devices
            .get_mut(id.index())
            .ok_or(HostError::UnknownDevice(id))?;
        send_outgoing(device, frame, &mut self.sim)
            .map_err(|source| HostError::Transmit { device: id, source })
    }

    /// Schedules a send from `device` at `time`, in its node's slot.
    pub fn schedule_send(
        &mut self,
        id: DeviceId,
        time: SimTime,
        frame: OutgoingFrame,
    ) -> Result<EventId, HostError> {
        let node = self.device(id)?.node();
        let delay = time.saturating_sub(self.sim.now());
        Ok(self.sim.schedule_with_context(
            node,
            delay,
            Priority::Normal,
            LinkTask::new(id, LinkEvent::Send(frame)),
        ))
    }

    /// Dispatches the next event due at or before `deadline`.
    ///
    /// Returns `Ok(false)` when nothing is due.
    pub fn step_until(&mut self, deadline: SimTime) -> Result<bool, HostError> {
        let Some(event) = self.sim.step_until(deadline) else {
            return Ok(false);
        };
        self.dispatch(event.payload)?;
        Ok(true)
    }

    /// Runs every event up to `deadline`, then moves the clock there.
    ///
    /// Stops early at the first fatal device error or when a simulation
    /// limit is reached.
    pub fn run_until(&mut self, deadline: SimTime) -> Result<SimSummary, HostError> {
        while self.step_until(deadline)? {}

        let target = deadline.min(self.sim.config().max_time);
        let blocked = self
            .sim
            .events()
            .next_time()
            .is_some_and(|next| next < target);
        if !self.sim.limit_reached() && !blocked && target >= self.sim.now() {
            self.sim.advance_to(target)?;
        }

        let summary = self.sim.summary();
        tracing::debug!(
            events = summary.events_processed,
            time = %summary.final_time,
            pending = summary.pending_events,
            "run finished"
        );
        Ok(summary)
    }

    fn dispatch(&mut self, task: LinkTask) -> Result<(), HostError> {
        let id = task.device;
        let device = self
            .devices
            .get_mut(id.index())
            .ok_or(HostError::UnknownDevice(id))?;

        match task.event {
            LinkEvent::Poll => device
                .poll(&mut self.sim)
                .map_err(|source| HostError::Link { device: id, source }),
            LinkEvent::SyncTick => device
                .sync_tick(&mut self.sim)
                .map_err(|source| HostError::Link { device: id, source }),
            LinkEvent::Receive(frame) => {
                // A frame deferred just before the device stopped.
                if device.state() == AdapterState::Started {
                    device.rx_in_context(frame, self.sim.now());
                } else {
                    tracing::debug!(device = %id, "frame arrived after stop, discarded");
                }
                Ok(())
            }
            LinkEvent::Send(frame) => match send_outgoing(device, frame, &mut self.sim) {
                Err(e) if !e.is_transient() => Err(HostError::Transmit {
                    device: id,
                    source: e,
                }),
                _ => Ok(()),
            },
        }
    }
}

fn send_outgoing<C: Channel>(
    device: &mut DeviceShim<C>,
    frame: OutgoingFrame,
    sched: &mut dyn Scheduler<LinkTask>,
) -> Result<(), TransmitError> {
    let source = frame.source.unwrap_or_else(|| device.address());
    device.send_from(
        frame.payload,
        source,
        frame.destination,
        frame.protocol,
        sched,
    )
}
