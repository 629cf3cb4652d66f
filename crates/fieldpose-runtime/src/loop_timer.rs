//! [`LoopTimer`] – wall-time between successive calls.
//!
//! Each loop that wants timing owns its own timer; there is no shared
//! global state.  Every `elapsed_*` call returns the time since the previous
//! `elapsed_*` call (of any kind) and moves the reference point to now.
//!
//! The first call measures from construction (or [`LoopTimer::reset`]) and
//! should normally be discarded.
//!
//! # Example
//!
//! ```rust
//! use fieldpose_runtime::loop_timer::LoopTimer;
//!
//! let mut timer = LoopTimer::new();
//! let _ = timer.elapsed_nanos(); // discard
//! std::thread::sleep(std::time::Duration::from_millis(5));
//! assert!(timer.elapsed_seconds() >= 0.005);
//! ```

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct LoopTimer {
    last: Instant,
}

impl Default for LoopTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopTimer {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Move the reference point to now without reporting anything.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Nanoseconds since the previous call.  Saturates at `i64::MAX`.
    pub fn elapsed_nanos(&mut self) -> i64 {
        let now = Instant::now();
        let delta = now.duration_since(self.last);
        self.last = now;
        i64::try_from(delta.as_nanos()).unwrap_or(i64::MAX)
    }

    pub fn elapsed_seconds(&mut self) -> f64 {
        self.elapsed_nanos() as f64 / 1_000_000_000.0
    }

    /// Call rate implied by the time since the previous call.
    ///
    /// Infinite if two calls land on the same clock reading.
    pub fn elapsed_hertz(&mut self) -> f64 {
        1.0 / self.elapsed_seconds()
    }
}
