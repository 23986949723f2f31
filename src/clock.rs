//! Time base for the control kernel.
//!
//! Time is a wrapping `u32` millisecond counter read once per tick.  Every
//! comparison is done by wrapping subtraction so the loop keeps working
//! across the ~49.7 day rollover.  [`TimeScale`] divides control durations
//! by the configured speed-up factor.

use core::cell::Cell;

/// Monotonic millisecond source.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch; wraps at `u32::MAX`.
    fn now_ms(&self) -> u32;
}

/// Milliseconds elapsed from `since` to `now`, wraparound-safe.
#[inline]
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// `true` once `now` has reached or passed `deadline`.
///
/// Valid as long as the two instants are less than 2^31 ms apart.
#[inline]
pub fn deadline_reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Uniform time acceleration for every control-loop duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeScale {
    speedup: u32,
}

impl TimeScale {
    /// A speed-up of 0 is treated as 1 (real time).
    pub fn new(speedup: u32) -> Self {
        Self {
            speedup: speedup.max(1),
        }
    }

    pub fn speedup(&self) -> u32 {
        self.speedup
    }

    /// Scale a real-time duration.  A non-zero duration never becomes zero.
    pub fn scale(&self, duration_ms: u32) -> u32 {
        if duration_ms == 0 {
            return 0;
        }
        (duration_ms / self.speedup).max(1)
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Hand-driven clock for tests and deterministic simulation.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u32>,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}
