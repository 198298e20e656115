use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Time-windowed flag telling the rehydration path that a change notification was most
/// likely caused by a write this engine issued itself.
///
/// A window always runs to completion; there is no way to clear it early. Marking again
/// while a window is open extends it.
#[derive(Debug)]
pub struct SelfWriteGuard {
    window: Duration,
    suppressed_until: Mutex<Option<Instant>>,
}

impl SelfWriteGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            suppressed_until: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Starts a window of `window` length from now.
    pub fn mark_self_write(&self) {
        let until = Instant::now() + self.window;
        let mut guard = self.suppressed_until.lock();
        // never shorten a window that is already open
        let until = match *guard {
            Some(current) if current > until => current,
            _ => until,
        };
        *guard = Some(until);
        trace!(?until, "self write suppression armed");
    }

    pub fn is_suppressed(&self) -> bool {
        match *self.suppressed_until.lock() {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }
}
