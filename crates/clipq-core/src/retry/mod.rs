//! Retry policy for stream transfers.
//!
//! A fixed number of attempts with a fixed cooldown in between, plus the
//! retry loop that honours cooperative cancellation between attempts.

mod policy;
mod run;

pub use policy::{RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryOutcome};
