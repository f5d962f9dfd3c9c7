//! Recovery loop state machine.
//!
//! Bounded retry for structured-output failures: the session re-prompts the
//! model with the prior failure under exponential backoff. Transport errors
//! abort the loop immediately; the retry budget is reserved for decode and
//! validation failures.

use std::time::Duration;

use crate::domain::DomainError;

/// Total attempts per structured request, the original included.
pub(crate) const MAX_ATTEMPTS: u32 = 3;

const MAX_BACKOFF_SECS: u64 = 10;

/// Tagged states of the retry machine. Entered at `Attempting` with
/// attempt 2 after the orchestrator's first attempt fails; transport
/// failures leave the machine by early return instead of a state.
#[derive(Debug)]
pub(crate) enum RecoveryState<T> {
    Attempting { attempt: u32, failure: DomainError },
    Succeeded(T),
    Exhausted { attempts: u32, failure: DomainError },
}

/// Delay observed before recovery attempt `attempt` (2-based): 1 time unit
/// doubling per attempt, capped at 10. The original attempt runs immediately.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    debug_assert!(attempt >= 2, "attempt 1 never waits");
    // One extra doubling past the cap is enough; min() does the rest.
    let doublings = attempt.saturating_sub(2).min(4);
    Duration::from_secs((1u64 << doublings).min(MAX_BACKOFF_SECS))
}
