//! Monotonic clock seam.
//!
//! Sensors never call `Instant::now()` directly; they read time through a
//! shared [`Clock`] handle. Production code uses [`SystemClock`], tests and
//! simulations drive a [`ManualClock`] forward explicitly so windowed
//! sampling and drift timing stay deterministic.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Real monotonic time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Wrap the system clock in a shared handle.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// Manually advanced clock for tests and offline simulation.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}
