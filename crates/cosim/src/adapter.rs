//! Adapter: the channel connection and its timing policy.
//!
//! The adapter owns the channel handle, the poll timer and the sync timer.
//! Every outgoing message is stamped `now + link_latency`, which promises
//! the peer that nothing earlier will follow on this direction. When no
//! data has been sent for one sync interval, a content-free heartbeat
//! renews that promise so the peer never waits on silence.
//!
//! # Polling
//!
//! - **Unsynchronized**: each poll drains everything present, regardless of
//!   timestamp, and re-arms at `now + poll_interval`.
//! - **Synchronized**: each poll consumes messages stamped at or before
//!   `now`, then re-arms exactly at the next pending message's timestamp,
//!   which is the furthest the local clock may safely run. With nothing
//!   pending the adapter must wait for the peer.
//!
//! Heartbeats run at [`Priority::Transmit`] and polls at
//! [`Priority::Receive`], so at any instant sends precede polls. Together
//! with `sync_interval <= link_latency` this keeps a message beyond `now`
//! pending whenever a synchronized poll runs.

use std::fmt::{self, Display};

use bytes::Bytes;
use cosim_channel::{Channel, Message, MessageKind};
use cosim_config::LinkEndpointConfig;
use cosim_sim::{EventId, Priority, Scheduler};
use cosim_types::{DeviceId, NodeId, SimTime};

use crate::error::{LinkError, TransmitError};
use crate::task::{LinkEvent, LinkTask};

/// Callback receiving each inbound data frame, header included.
pub type AdapterReceiveCallback = Box<dyn FnMut(Bytes, &mut dyn Scheduler<LinkTask>)>;

/// Lifecycle of an adapter (and of the device owning it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Created,
    Started,
    Stopped,
}

impl Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Connection state; the handle exists exactly while started.
enum State<H> {
    Created,
    Started(H),
    Stopped,
}

impl<H> State<H> {
    fn kind(&self) -> AdapterState {
        match self {
            Self::Created => AdapterState::Created,
            Self::Started(_) => AdapterState::Started,
            Self::Stopped => AdapterState::Stopped,
        }
    }
}

/// Counters for one adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    pub frames_sent: u64,
    pub syncs_sent: u64,
    /// Sends (data or heartbeat) refused for lack of a free slot.
    pub send_backpressure: u64,
    pub frames_received: u64,
    pub syncs_received: u64,
    /// Empty data messages; the device drops them as undersized.
    pub malformed_dropped: u64,
}

pub struct Adapter<C: Channel> {
    channel: C,
    device: DeviceId,
    config: LinkEndpointConfig,
    state: State<C::Handle>,
    poll_timer: Option<EventId>,
    sync_timer: Option<EventId>,
    last_tx: SimTime,
    peer_time: SimTime,
    stats: AdapterStats,
    rx_callback: Option<AdapterReceiveCallback>,
}

impl<C: Channel> Adapter<C> {
    pub fn new(channel: C, device: DeviceId) -> Self {
        Self {
            channel,
            device,
            config: LinkEndpointConfig::default(),
            state: State::Created,
            poll_timer: None,
            sync_timer: None,
            last_tx: SimTime::ZERO,
            peer_time: SimTime::ZERO,
            stats: AdapterStats::default(),
            rx_callback: None,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state.kind()
    }

    pub fn config(&self) -> &LinkEndpointConfig {
        &self.config
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    /// Latest timestamp received from the peer.
    pub fn peer_time(&self) -> SimTime {
        self.peer_time
    }

    pub fn poll_timer(&self) -> Option<EventId> {
        self.poll_timer
    }

    pub fn sync_timer(&self) -> Option<EventId> {
        self.sync_timer
    }

    /// Time since the last message (data or heartbeat) went out.
    pub fn pending_tx_window(&self, now: SimTime) -> SimTime {
        now.saturating_sub(self.last_tx)
    }

    /// Replaces the receive callback; the previous one is discarded.
    pub fn set_receive_callback(&mut self, callback: AdapterReceiveCallback) {
        self.rx_callback = Some(callback);
    }

    /// Connects the channel and arms both timers.
    ///
    /// # Panics
    ///
    /// Panics unless the adapter is in [`AdapterState::Created`].
    pub fn start(
        &mut self,
        config: LinkEndpointConfig,
        sched: &mut dyn Scheduler<LinkTask>,
    ) -> Result<(), LinkError> {
        assert_eq!(
            self.state(),
            AdapterState::Created,
            "adapter {} can only be started once",
            self.device
        );
        config.validate()?;

        let params = config.to_connect_params();
        let handle = self
            .channel
            .connect(&params)
            .map_err(|source| LinkError::Connect {
                path: params.path.clone(),
                source,
            })?;

        self.config = config;
        self.state = State::Started(handle);
        self.last_tx = sched.now();

        tracing::info!(
            device = %self.device,
            path = %params.path,
            sync_mode = %self.config.sync_mode,
            latency = %self.config.link_latency(),
            "adapter started"
        );

        // Announce our clock before anything else goes out.
        self.send_sync(sched)?;

        let first_poll = if self.config.sync_mode.is_synchronized() {
            SimTime::ZERO
        } else {
            self.config.poll_interval()
        };
        self.arm_poll(sched, first_poll);
        Ok(())
    }

    /// Cancels both timers, then closes the channel. Idempotent.
    pub fn stop(&mut self, sched: &mut dyn Scheduler<LinkTask>) {
        match std::mem::replace(&mut self.state, State::Stopped) {
            State::Started(handle) => {
                if let Some(id) = self.poll_timer.take() {
                    sched.cancel(id);
                }
                if let Some(id) = self.sync_timer.take() {
                    sched.cancel(id);
                }
                if let Err(e) = self.channel.close(handle) {
                    tracing::warn!(device = %self.device, error = %e, "error closing channel");
                }
                tracing::info!(device = %self.device, stats = ?self.stats, "adapter stopped");
            }
            State::Created | State::Stopped => {}
        }
    }

    /// Sends one frame, or drops it if the channel has no free slot.
    ///
    /// # Panics
    ///
    /// Panics unless the adapter is started.
    pub fn transmit(
        &mut self,
        frame: Bytes,
        sched: &mut dyn Scheduler<LinkTask>,
    ) -> Result<(), TransmitError> {
        let now = sched.now();
        let device = self.device;
        let state = self.state();
        let State::Started(handle) = &mut self.state else {
            panic!("cannot transmit on adapter {device}: {state}");
        };

        let Some(slot) = self.channel.alloc_send_slot(handle)? else {
            self.stats.send_backpressure += 1;
            tracing::warn!(device = %device, len = frame.len(), "no free send slot, dropping frame");
            return Err(TransmitError::ChannelFull);
        };

        let timestamp = now + self.config.link_latency();
        let len = frame.len();
        self.channel
            .commit(handle, slot, Message::data(timestamp, frame))?;

        self.stats.frames_sent += 1;
        self.last_tx = now;
        tracing::trace!(device = %device, len, timestamp = %timestamp, "frame sent");

        self.arm_sync(sched);
        Ok(())
    }

    /// Sync timer expiry: sends a heartbeat and re-arms.
    pub fn on_sync_tick(&mut self, sched: &mut dyn Scheduler<LinkTask>) -> Result<(), LinkError> {
        self.sync_timer = None;
        self.send_sync(sched)
    }

    /// Poll timer expiry: drains the channel and re-arms.
    ///
    /// # Panics
    ///
    /// Panics unless the adapter is started.
    pub fn poll(&mut self, sched: &mut dyn Scheduler<LinkTask>) -> Result<(), LinkError> {
        self.poll_timer = None;

        let now = sched.now();
        let synchronized = self.config.sync_mode.is_synchronized();
        let bound = if synchronized { now } else { SimTime::MAX };
        let device = self.device;
        let state = self.state();
        let State::Started(handle) = &mut self.state else {
            panic!("cannot poll adapter {device}: {state}");
        };

        while let Some(message) = self.channel.poll(handle, bound)? {
            self.peer_time = self.peer_time.max(message.timestamp);
            match message.kind {
                MessageKind::Sync => self.stats.syncs_received += 1,
                MessageKind::Data(frame) => {
                    // Empty frames still go up so the device traces the drop.
                    if frame.is_empty() {
                        self.stats.malformed_dropped += 1;
                        tracing::warn!(device = %device, "empty data message");
                    } else {
                        self.stats.frames_received += 1;
                    }
                    match self.rx_callback.as_mut() {
                        Some(callback) => callback(frame, &mut *sched),
                        None => tracing::debug!(device = %device, "no receive callback, frame discarded"),
                    }
                }
            }
        }

        let next = if synchronized {
            let horizon = match self.channel.next_timestamp(handle)? {
                Some(timestamp) => timestamp,
                None => {
                    tracing::debug!(device = %device, now = %now, "no safe horizon, waiting for peer");
                    self.channel.wait_readable(handle)?;
                    self.channel.next_timestamp(handle)?.unwrap_or(now)
                }
            };
            horizon.max(now)
        } else {
            now + self.config.poll_interval()
        };

        self.arm_poll(sched, next - now);
        Ok(())
    }

    fn send_sync(&mut self, sched: &mut dyn Scheduler<LinkTask>) -> Result<(), LinkError> {
        let now = sched.now();
        let device = self.device;
        let state = self.state();
        let State::Started(handle) = &mut self.state else {
            panic!("cannot send heartbeat on adapter {device}: {state}");
        };

        match self.channel.alloc_send_slot(handle)? {
            Some(slot) => {
                let timestamp = now + self.config.link_latency();
                self.channel.commit(handle, slot, Message::sync(timestamp))?;
                self.stats.syncs_sent += 1;
                self.last_tx = now;
                tracing::trace!(device = %device, timestamp = %timestamp, "heartbeat sent");
            }
            None => {
                self.stats.send_backpressure += 1;
                tracing::warn!(device = %device, "no free send slot for heartbeat");
            }
        }

        self.arm_sync(sched);
        Ok(())
    }

    fn arm_sync(&mut self, sched: &mut dyn Scheduler<LinkTask>) {
        if let Some(id) = self.sync_timer.take() {
            sched.cancel(id);
        }
        let id = sched.schedule_with_context(
            NodeId::NONE,
            self.config.sync_interval(),
            Priority::Transmit,
            LinkTask::new(self.device, LinkEvent::SyncTick),
        );
        self.sync_timer = Some(id);
    }

    fn arm_poll(&mut self, sched: &mut dyn Scheduler<LinkTask>, delay: SimTime) {
        debug_assert!(self.poll_timer.is_none(), "poll timer already armed");
        let id = sched.schedule_with_context(
            NodeId::NONE,
            delay,
            Priority::Receive,
            LinkTask::new(self.device, LinkEvent::Poll),
        );
        self.poll_timer = Some(id);
    }
}

impl<C: Channel> fmt::Debug for Adapter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("device", &self.device)
            .field("state", &self.state())
            .field("poll_timer", &self.poll_timer)
            .field("sync_timer", &self.sync_timer)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
