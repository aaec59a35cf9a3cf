//! # cosim-sim: Deterministic discrete-event host for `cosim`
//!
//! A minimal single-threaded event timeline that plays the role of the host
//! network simulator: it owns simulated time, orders deferred work, and
//! tracks which node's execution slot is running.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 Simulation<E>                 │
//! │  ┌───────────┐  ┌──────────────┐  ┌────────┐  │
//! │  │ SimClock  │  │ EventQueue<E>│  │context │  │
//! │  │ (discrete)│  │ (cancellable)│  │(NodeId)│  │
//! │  └───────────┘  └──────────────┘  └────────┘  │
//! └───────────────────────┬───────────────────────┘
//!                         │ Scheduler<E>
//!                ┌────────┴────────┐
//!                │ devices / hosts │
//!                └─────────────────┘
//! ```
//!
//! The simulation never interprets payloads. Drivers call [`Simulation::step`]
//! and dispatch the returned [`Event`] themselves; handlers schedule follow-up
//! work through the [`Scheduler`] trait.
//!
//! ## Ordering
//!
//! Events fire by time, then by [`Priority`], then in scheduling order, so a
//! run is a pure function of the work scheduled into it.

mod clock;
mod error;
mod event;
mod scheduler;

pub use clock::SimClock;
pub use error::SimError;
pub use event::{Event, EventId, EventQueue, Priority};
pub use scheduler::Scheduler;

use cosim_types::{NodeId, SimTime};

// ============================================================================
// Simulation Configuration
// ============================================================================

/// Limits for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Maximum simulated time; events after it are never dispatched.
    pub max_time: SimTime,
    /// Maximum number of events to dispatch.
    pub max_events: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_time: SimTime::from_secs(60),
            max_events: 100_000_000,
        }
    }
}

impl SimConfig {
    pub fn with_max_time(mut self, max_time: SimTime) -> Self {
        self.max_time = max_time;
        self
    }

    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = max_events;
        self
    }
}

// ============================================================================
// Simulation Context
// ============================================================================

/// Clock, event queue and current execution context of one host timeline.
#[derive(Debug)]
pub struct Simulation<E> {
    config: SimConfig,
    clock: SimClock,
    events: EventQueue<E>,
    context: NodeId,
    events_processed: u64,
}

impl<E> Simulation<E> {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            clock: SimClock::new(),
            events: EventQueue::new(),
            context: NodeId::NONE,
            events_processed: 0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn events(&self) -> &EventQueue<E> {
        &self.events
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Returns `true` once the event budget is spent.
    pub fn limit_reached(&self) -> bool {
        self.events_processed >= self.config.max_events
    }

    /// Pops the next event, advancing the clock and entering its context.
    ///
    /// Returns `None` if the queue is empty or a limit was reached.
    pub fn step(&mut self) -> Option<Event<E>> {
        self.step_until(self.config.max_time)
    }

    /// Like [`Simulation::step`], but never dispatches past `deadline`.
    pub fn step_until(&mut self, deadline: SimTime) -> Option<Event<E>> {
        if self.limit_reached() {
            return None;
        }

        let next = self.events.next_time()?;
        if next > deadline || next > self.config.max_time {
            return None;
        }

        let event = self.events.pop()?;
        self.clock.advance_to(event.time);
        self.context = event.context;
        self.events_processed += 1;

        tracing::trace!(
            id = %event.id,
            time = %event.time,
            context = %event.context,
            "dispatching event"
        );

        Some(event)
    }

    /// Moves the clock forward to `time` without dispatching anything.
    ///
    /// Used by drivers once every event up to `time` has been handled.
    pub fn advance_to(&mut self, time: SimTime) -> Result<(), SimError> {
        let now = self.clock.now();
        if time < now {
            return Err(SimError::DeadlineInPast {
                deadline: time,
                now,
            });
        }
        if let Some(next) = self.events.next_time() {
            debug_assert!(next >= time, "advancing past a pending event");
        }
        self.clock.advance_to(time);
        self.context = NodeId::NONE;
        Ok(())
    }

    /// Sets the execution context outside of event dispatch (setup code).
    pub fn enter_context(&mut self, context: NodeId) {
        self.context = context;
    }

    pub fn summary(&self) -> SimSummary {
        SimSummary {
            events_processed: self.events_processed,
            final_time: self.clock.now(),
            pending_events: self.events.len(),
        }
    }
}

impl<E> Default for Simulation<E> {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl<E> Scheduler<E> for Simulation<E> {
    fn now(&self) -> SimTime {
        self.clock.now()
    }

    fn current_context(&self) -> NodeId {
        self.context
    }

    fn schedule_at(&mut self, time: SimTime, priority: Priority, payload: E) -> EventId {
        assert!(
            time >= self.clock.now(),
            "cannot schedule in the past: now={}, requested={}",
            self.clock.now(),
            time
        );
        self.events.schedule(time, priority, self.context, payload)
    }

    fn schedule_with_context(
        &mut self,
        context: NodeId,
        delay: SimTime,
        priority: Priority,
        payload: E,
    ) -> EventId {
        let time = self.clock.now() + delay;
        self.events.schedule(time, priority, context, payload)
    }

    fn cancel(&mut self, id: EventId) -> bool {
        self.events.cancel(id)
    }
}

// ============================================================================
// Simulation Summary
// ============================================================================

/// Snapshot of a simulation's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSummary {
    pub events_processed: u64,
    pub final_time: SimTime,
    pub pending_events: usize,
}

#[cfg(test)]
mod tests;
