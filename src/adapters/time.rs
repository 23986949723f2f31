//! Host time adapter.
//!
//! Provides the millisecond tick the control kernel runs on.  The value
//! wraps after ~49.7 days exactly like an MCU `millis()` counter, so the
//! wraparound paths get exercised on the host too.

use std::time::Instant;

use crate::clock::Clock;

/// Monotonic clock anchored at construction time.
pub struct SystemClock {
    start: Instant,
    /// Added to every reading; lets a simulation start close to the wrap.
    offset_ms: u32,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    pub fn with_offset(offset_ms: u32) -> Self {
        Self {
            start: Instant::now(),
            offset_ms,
        }
    }

    /// Seconds since construction.
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap.
        (self.start.elapsed().as_millis() as u32).wrapping_add(self.offset_ms)
    }
}
