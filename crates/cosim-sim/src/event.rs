//! Cancellable, deterministically ordered event queue.
//!
//! Events are ordered by `(time, priority, insertion sequence)`. The
//! sequence number doubles as the [`EventId`], so two events scheduled for
//! the same instant and priority fire in FIFO order.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use cosim_types::{NodeId, SimTime};

/// Handle to a scheduled event, usable for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tie-break class for events scheduled at the same instant.
///
/// Lower classes run first. Sending to a peer is `Transmit` so that every
/// message a node emits at time `t` is on the channel before any node polls
/// at `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Transmit,
    #[default]
    Normal,
    Receive,
}

/// An event popped from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<E> {
    pub id: EventId,
    pub time: SimTime,
    pub priority: Priority,
    /// Node whose execution slot this event runs in.
    pub context: NodeId,
    pub payload: E,
}

type Key = (SimTime, Priority, u64);

#[derive(Debug)]
struct Slot<E> {
    context: NodeId,
    payload: E,
}

/// Priority queue of scheduled events with O(log n) cancellation.
#[derive(Debug)]
pub struct EventQueue<E> {
    entries: BTreeMap<Key, Slot<E>>,
    index: HashMap<EventId, Key>,
    next_seq: u64,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Schedules `payload` at `time` and returns its id.
    pub fn schedule(
        &mut self,
        time: SimTime,
        priority: Priority,
        context: NodeId,
        payload: E,
    ) -> EventId {
        let seq = self.next_seq;
        self.next_seq += 1;

        let id = EventId(seq);
        let key = (time, priority, seq);
        self.entries.insert(key, Slot { context, payload });
        self.index.insert(id, key);
        id
    }

    /// Removes a pending event.
    ///
    /// Returns `false` if the event already fired or was cancelled before.
    pub fn cancel(&mut self, id: EventId) -> bool {
        match self.index.remove(&id) {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Removes and returns the earliest event.
    pub fn pop(&mut self) -> Option<Event<E>> {
        let ((time, priority, seq), slot) = self.entries.pop_first()?;
        let id = EventId(seq);
        self.index.remove(&id);
        Some(Event {
            id,
            time,
            priority,
            context: slot.context,
            payload: slot.payload,
        })
    }

    /// Returns the time of the earliest event, if any.
    pub fn next_time(&self) -> Option<SimTime> {
        self.entries.first_key_value().map(|((time, _, _), _)| *time)
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over pending payloads in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.values().map(|slot| &slot.payload)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}
