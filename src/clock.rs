//! The monotonic clock and sleep primitives the scheduler is built on.
//!
//! Kept as a single-purpose wrapper module, separate from the scheduling
//! logic that consumes it.

use std::time::Instant;

use crate::error::Result;

/// Milliseconds since an arbitrary epoch, monotonic within one process run.
pub type TimeMs = i64;

/// A monotonic millisecond clock, anchored to the moment it was created.
#[derive(Debug)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Clock {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> TimeMs {
        self.origin.elapsed().as_millis() as TimeMs
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback used when the scheduler has nothing to watch but a finite
/// timeout is pending: sleeps without invoking the readiness primitive.
pub fn sleep_ms(ms: i64) -> Result<()> {
    if ms > 0 {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
    Ok(())
}
