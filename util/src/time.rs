//! General time utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a bounded poll can end without its condition being met.
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    /// The condition was not met before the deadline, holds the time spent polling.
    #[error("Condition not met after {0:?}")]
    Timeout(Duration),

    /// The condition check itself failed.
    #[error("Condition check failed: {0}")]
    Check(E),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Repeatedly evaluate `check` until it returns `Ok(true)` or `timeout` has elapsed.
///
/// `check` is always evaluated at least once, then once every `interval`. The last sleep is
/// shortened so the call never overruns the deadline by more than one evaluation. An `Err` from
/// `check` ends the poll immediately.
pub fn poll_until<E, F>(interval: Duration, timeout: Duration, mut check: F) -> Result<(), PollError<E>>
where
    F: FnMut() -> Result<bool, E>,
{
    let start = Instant::now();

    loop {
        if check().map_err(PollError::Check)? {
            return Ok(());
        }

        let remaining = timeout
            .checked_sub(start.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if remaining == Duration::from_secs(0) {
            return Err(PollError::Timeout(start.elapsed()));
        }

        thread::sleep(interval.min(remaining));
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
