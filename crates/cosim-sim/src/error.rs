//! Simulation error types.

use cosim_types::SimTime;

/// Errors that end a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// The configured event budget was exhausted before the deadline.
    #[error("event limit of {limit} reached at {at}")]
    EventLimitExceeded { limit: u64, at: SimTime },

    /// The run was asked to stop at a time the clock has already passed.
    #[error("deadline {deadline} is before current time {now}")]
    DeadlineInPast { deadline: SimTime, now: SimTime },
}
