//! The polymorphic sensor lifecycle contract.

use std::time::{Duration, Instant};

use crate::error::SensorError;
use crate::snapshot::Snapshot;

/// Capability contract every sensor variant implements.
///
/// The registry drives each sensor through the same three lifecycle calls on
/// a fixed external cadence; variants differ only in what determines
/// readiness and what fields populate the snapshot.
pub trait Sensor {
    /// Display name, used as the snapshot owner and the sink measurement.
    fn name(&self) -> &str;

    /// Bring up the hardware. Must succeed before any other call is valid.
    fn initialize(&mut self) -> Result<(), SensorError>;

    /// Advance internal state. Called once per driver cycle and must not
    /// block longer than the tolerable loop latency.
    fn poll(&mut self) -> Result<(), SensorError>;

    /// Produce this cycle's readings.
    ///
    /// Returns an empty [`Snapshot`] when the sensor is not yet due and
    /// `force` is false ("not yet ready" is not an error). When due or
    /// forced, returns a populated snapshot; `mark_consumed` resets the due
    /// timer to the current time. Fails with
    /// [`SensorError::NotInitialized`] before a successful `initialize`,
    /// or [`SensorError::ReadFailure`] on a failed hardware transaction.
    fn read_snapshot(&mut self, force: bool, mark_consumed: bool) -> Result<Snapshot, SensorError>;
}

/// Per-sensor timestamp gating how often a non-forced read yields new data.
#[derive(Debug, Clone)]
pub struct DueTimer {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl DueTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True when no reading was ever accepted or the interval has elapsed.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_accepted {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }

    /// Mark a reading as accepted at `now`.
    pub fn stamp(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }
}
