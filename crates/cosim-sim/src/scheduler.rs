//! Scheduler trait: the contract devices use to reach the host timeline.
//!
//! Devices never own the event loop. They ask the host for "now", for
//! deferred work at a later (or the current) instant, and for work that must
//! run inside a specific node's execution slot. The trait is object safe so
//! devices can take `&mut dyn Scheduler<E>` on their cold paths.

use cosim_types::{NodeId, SimTime};

use crate::event::{EventId, Priority};

/// Access to the host simulator's timeline.
pub trait Scheduler<E> {
    /// Current simulated time.
    fn now(&self) -> SimTime;

    /// Node whose execution slot is currently running.
    fn current_context(&self) -> NodeId;

    /// Schedules `payload` at an absolute time in the current context.
    ///
    /// # Panics
    ///
    /// Implementations panic if `time` is earlier than [`Scheduler::now`].
    fn schedule_at(&mut self, time: SimTime, priority: Priority, payload: E) -> EventId;

    /// Schedules `payload` after `delay`, running in `context`'s slot.
    fn schedule_with_context(
        &mut self,
        context: NodeId,
        delay: SimTime,
        priority: Priority,
        payload: E,
    ) -> EventId;

    /// Cancels a pending event; returns `false` if it is no longer pending.
    fn cancel(&mut self, id: EventId) -> bool;

    /// Schedules `payload` after `delay` in the current context.
    fn schedule_after(&mut self, delay: SimTime, priority: Priority, payload: E) -> EventId {
        let time = self.now() + delay;
        self.schedule_at(time, priority, payload)
    }
}
