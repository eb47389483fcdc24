//! Playback clock.
//!
//! A single wall clock paces both streams. Consumers never derive time from their
//! own decode rate; they read [`Clock::elapsed`] and suspend through [`Clock::sleep`].

use std::thread;
use std::time::{Duration, Instant};

/// Time authority for a playback session.
///
/// `sleep` is the only way the loop suspends, so a virtual clock can stand in for
/// wall time without changing any pacing logic.
pub trait Clock {
    /// Time since playback started. Monotonically non-decreasing.
    fn elapsed(&self) -> Duration;

    /// Cooperatively suspend the single thread of control for `dur`.
    fn sleep(&self, dur: Duration);
}

/// Wall-clock elapsed time relative to the instant playback started.
#[derive(Clone, Copy, Debug)]
pub struct MediaClock {
    start: Instant,
}

impl MediaClock {
    /// Start the clock now.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Instant the clock was started at.
    pub fn start_instant(&self) -> Instant {
        self.start
    }
}

impl Clock for MediaClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, dur: Duration) {
        if !dur.is_zero() {
            thread::sleep(dur);
        }
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn elapsed(&self) -> Duration {
        (**self).elapsed()
    }

    fn sleep(&self, dur: Duration) {
        (**self).sleep(dur)
    }
}
