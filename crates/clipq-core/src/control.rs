//! Cooperative cancellation: one shared flag for a whole queue run.
//!
//! The CLI sets the flag (Ctrl-C); the orchestrator polls it at safe points and
//! from the transfer progress callback. An in-flight transfer or conversion is
//! never interrupted; the run unwinds once it returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity of `CancelToken::sleep` wake-ups.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared cancel flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Sleeps for `duration` or until cancelled, whichever comes first.
    /// Returns true if the wait ended because of cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(POLL_INTERVAL));
        }
    }
}
