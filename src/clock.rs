//! Time sources for the scan and calibration loops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Trait representing a monotonic clock that can also block for a while.
///
/// Loops never call `std::thread::sleep` directly so tests can swap in a
/// [`ManualClock`] and run a 30 s scan in microseconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Default clock backed by `Instant::now` and `thread::sleep`.
#[derive(Default)]
pub struct SystemClock {
    _unit: (),
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock for deterministic runs.
///
/// `now()` never moves on its own; `sleep()` returns immediately after
/// advancing the clock by the requested duration.
pub struct ManualClock {
    start: Instant,
    offset_us: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_us: AtomicU64::new(0),
        }
    }

    /// Move the clock forward without sleeping
    pub fn advance(&self, duration: Duration) {
        self.offset_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    /// Total virtual time elapsed since construction
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Current wall-clock time as UNIX milliseconds
pub fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
