//! In-process loopback channel.
//!
//! A [`LoopbackFabric`] pairs endpoints that connect on the same path: the
//! first to connect listens, the second joins. Each direction is a bounded,
//! lock-free queue (`crossbeam_queue::ArrayQueue`); when the receiver's
//! queue is full the sender cannot reserve a slot, which surfaces as
//! backpressure instead of unbounded buffering.
//!
//! Both peers live in the same process, so a receiver can never block
//! waiting for its peer: [`Channel::wait_readable`] reports
//! [`ChannelError::WouldStall`] instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cosim_types::{SimTime, SyncMode};
use crossbeam_queue::ArrayQueue;

use crate::channel::{Channel, ConnectParams, SendSlot};
use crate::{ChannelError, Message};

/// Default per-direction queue depth.
pub const DEFAULT_LOOPBACK_CAPACITY: usize = 1024;

/// One direction of a link.
#[derive(Debug)]
struct Pipe {
    queue: ArrayQueue<Message>,
    /// Set once the sending side has closed.
    closed: AtomicBool,
}

impl Pipe {
    fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
        }
    }
}

#[derive(Debug)]
struct Link {
    sync_mode: SyncMode,
    listener_to_joiner: Arc<Pipe>,
    joiner_to_listener: Arc<Pipe>,
    joined: bool,
    open_endpoints: u8,
}

/// Registry of in-process links, keyed by path.
#[derive(Debug)]
pub struct LoopbackFabric {
    capacity: usize,
    links: Mutex<HashMap<String, Link>>,
    next_slot: AtomicU64,
}

impl LoopbackFabric {
    /// Creates a fabric whose queues hold `capacity` messages per direction.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Arc<Self> {
        assert!(capacity > 0, "loopback capacity must be positive");
        Arc::new(Self {
            capacity,
            links: Mutex::new(HashMap::new()),
            next_slot: AtomicU64::new(0),
        })
    }

    /// Returns a channel backed by this fabric.
    pub fn channel(self: &Arc<Self>) -> LoopbackChannel {
        LoopbackChannel {
            fabric: Arc::clone(self),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of paths with at least one open endpoint.
    pub fn open_links(&self) -> usize {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A [`Channel`] endpoint factory bound to a [`LoopbackFabric`].
#[derive(Debug, Clone)]
pub struct LoopbackChannel {
    fabric: Arc<LoopbackFabric>,
}

/// Connection state of one loopback endpoint.
#[derive(Debug)]
pub struct LoopbackHandle {
    path: String,
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    /// Message taken off the queue to peek at its timestamp.
    lookahead: Option<Message>,
    reserved: usize,
    last_sent: SimTime,
}

impl LoopbackHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Messages waiting in this endpoint's inbound direction.
    pub fn inbound_len(&self) -> usize {
        self.rx.queue.len() + usize::from(self.lookahead.is_some())
    }

    fn fill_lookahead(&mut self) {
        if self.lookahead.is_none() {
            self.lookahead = self.rx.queue.pop();
        }
    }

    fn peer_closed(&self) -> bool {
        self.rx.closed.load(Ordering::Acquire)
    }

    fn disconnected(&self) -> ChannelError {
        ChannelError::Disconnected {
            path: self.path.clone(),
        }
    }
}

impl Channel for LoopbackChannel {
    type Handle = LoopbackHandle;

    fn connect(&self, params: &ConnectParams) -> Result<LoopbackHandle, ChannelError> {
        if params.path.is_empty() {
            return Err(ChannelError::InvalidParams(
                "channel path must not be empty".to_string(),
            ));
        }

        let mut links = self
            .fabric
            .links
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let handle = match links.get_mut(&params.path) {
            None => {
                let link = Link {
                    sync_mode: params.sync_mode,
                    listener_to_joiner: Arc::new(Pipe::new(self.fabric.capacity)),
                    joiner_to_listener: Arc::new(Pipe::new(self.fabric.capacity)),
                    joined: false,
                    open_endpoints: 1,
                };
                let handle = LoopbackHandle {
                    path: params.path.clone(),
                    rx: Arc::clone(&link.joiner_to_listener),
                    tx: Arc::clone(&link.listener_to_joiner),
                    lookahead: None,
                    reserved: 0,
                    last_sent: SimTime::ZERO,
                };
                links.insert(params.path.clone(), link);
                tracing::debug!(path = %params.path, "loopback listener connected");
                handle
            }
            Some(link) if link.joined => {
                return Err(ChannelError::PeerCountMismatch {
                    path: params.path.clone(),
                });
            }
            Some(link) => {
                if link.sync_mode != params.sync_mode {
                    return Err(ChannelError::SyncModeMismatch {
                        path: params.path.clone(),
                        local: params.sync_mode,
                        peer: link.sync_mode,
                    });
                }
                link.joined = true;
                link.open_endpoints += 1;
                tracing::debug!(path = %params.path, "loopback peer joined");
                LoopbackHandle {
                    path: params.path.clone(),
                    rx: Arc::clone(&link.listener_to_joiner),
                    tx: Arc::clone(&link.joiner_to_listener),
                    lookahead: None,
                    reserved: 0,
                    last_sent: SimTime::ZERO,
                }
            }
        };

        Ok(handle)
    }

    fn poll(
        &self,
        handle: &mut LoopbackHandle,
        until: SimTime,
    ) -> Result<Option<Message>, ChannelError> {
        handle.fill_lookahead();
        match handle.lookahead.take() {
            Some(message) if message.timestamp <= until => Ok(Some(message)),
            Some(message) => {
                handle.lookahead = Some(message);
                Ok(None)
            }
            None if handle.peer_closed() => Err(handle.disconnected()),
            None => Ok(None),
        }
    }

    fn next_timestamp(&self, handle: &mut LoopbackHandle) -> Result<Option<SimTime>, ChannelError> {
        handle.fill_lookahead();
        Ok(handle.lookahead.as_ref().map(|message| message.timestamp))
    }

    fn wait_readable(&self, handle: &mut LoopbackHandle) -> Result<(), ChannelError> {
        handle.fill_lookahead();
        if handle.lookahead.is_some() {
            return Ok(());
        }
        if handle.peer_closed() {
            return Err(handle.disconnected());
        }
        Err(ChannelError::WouldStall {
            path: handle.path.clone(),
        })
    }

    fn alloc_send_slot(
        &self,
        handle: &mut LoopbackHandle,
    ) -> Result<Option<SendSlot>, ChannelError> {
        if handle.peer_closed() {
            return Err(handle.disconnected());
        }
        if handle.tx.queue.len() + handle.reserved >= handle.tx.queue.capacity() {
            return Ok(None);
        }
        handle.reserved += 1;
        let sequence = self.fabric.next_slot.fetch_add(1, Ordering::Relaxed);
        Ok(Some(SendSlot::new(sequence)))
    }

    fn commit(
        &self,
        handle: &mut LoopbackHandle,
        slot: SendSlot,
        message: Message,
    ) -> Result<(), ChannelError> {
        if handle.reserved == 0 {
            return Err(ChannelError::SlotNotReserved {
                path: handle.path.clone(),
            });
        }
        debug_assert!(
            message.timestamp >= handle.last_sent,
            "outgoing timestamps must not decrease: last={}, new={}",
            handle.last_sent,
            message.timestamp
        );
        handle.reserved -= 1;
        handle.last_sent = message.timestamp;

        tracing::trace!(
            path = %handle.path,
            slot = slot.sequence(),
            timestamp = %message.timestamp,
            len = message.len(),
            "loopback commit"
        );

        // Single producer per direction: a reserved slot always fits.
        handle
            .tx
            .queue
            .push(message)
            .map_err(|_| handle.disconnected())
    }

    fn close(&self, handle: LoopbackHandle) -> Result<(), ChannelError> {
        handle.tx.closed.store(true, Ordering::Release);

        let mut links = self
            .fabric
            .links
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(link) = links.get_mut(&handle.path) {
            link.open_endpoints = link.open_endpoints.saturating_sub(1);
            if link.open_endpoints == 0 {
                links.remove(&handle.path);
            }
        }

        tracing::debug!(path = %handle.path, "loopback endpoint closed");
        Ok(())
    }
}
