//! Retry loop: run a closure until success, exhaustion, or cancellation.

use super::policy::{RetryDecision, RetryPolicy};
use crate::control::CancelToken;

/// How a retried operation ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<E> {
    Succeeded { attempts: u32 },
    /// The policy gave up; `last_error` is the final attempt's error.
    Exhausted { attempts: u32, last_error: E },
    /// Cancellation was observed before the next attempt could start.
    Cancelled { attempts: u32, last_error: Option<E> },
}

/// Runs `f` (given the 1-based attempt number) until it succeeds or the
/// policy says stop. The cancel token is checked before every attempt and
/// the cooldown wait wakes early when it is set; a running attempt is never
/// interrupted.
pub fn run_with_retry<E, F>(policy: &RetryPolicy, cancel: &CancelToken, mut f: F) -> RetryOutcome<E>
where
    F: FnMut(u32) -> Result<(), E>,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    let mut last_error: Option<E> = None;
    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled {
                attempts: attempt - 1,
                last_error,
            };
        }
        match f(attempt) {
            Ok(()) => return RetryOutcome::Succeeded { attempts: attempt },
            Err(e) => match policy.decide(attempt) {
                RetryDecision::NoRetry => {
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    }
                }
                RetryDecision::RetryAfter(d) => {
                    tracing::debug!(attempt, delay_ms = d.as_millis() as u64, "attempt failed: {}; retrying", e);
                    last_error = Some(e);
                    cancel.sleep(d);
                    attempt += 1;
                }
            },
        }
    }
}
