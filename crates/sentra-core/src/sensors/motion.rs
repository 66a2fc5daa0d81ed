//! Six-axis inertial sensor with threshold-triggered recalibration.
//!
//! Initialization retries the bus handshake a bounded number of times, then
//! runs one blocking calibration pass to learn per-axis bias offsets.
//! Standard gravity is removed from the vertical offset during calibration.
//!
//! At runtime every `poll` checks the offset-corrected axes against a small
//! deadband. Sustained deviation is read as a changed bias baseline (the
//! device was moved and left at rest), not transient motion, and triggers
//! one automatic recalibration pass.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::clock::SharedClock;
use crate::error::SensorError;
use crate::hal::{MotionBus, MotionSample};
use crate::sensor::{DueTimer, Sensor};
use crate::snapshot::Snapshot;

/// Standard gravity, m/s².
const STANDARD_GRAVITY: f32 = 9.80665;

/// Tunables for [`MotionSensor`]. Defaults match the deployed hardware;
/// tests shrink the calibration pass to keep it instant.
#[derive(Debug, Clone)]
pub struct MotionConfig {
    /// How often a non-forced read yields new data.
    pub interval: Duration,
    /// Handshake attempt budget during initialization.
    pub init_attempts: u32,
    /// Delay between handshake attempts.
    pub init_retry_delay: Duration,
    /// Samples averaged per calibration pass.
    pub calibration_samples: u32,
    /// Delay between calibration samples.
    pub calibration_delay: Duration,
    /// Tolerance around zero within which a corrected axis counts as at
    /// rest.
    pub deadband: f32,
    /// How long any axis must stay outside the deadband before
    /// recalibration fires.
    pub sustained: Duration,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            init_attempts: 5,
            init_retry_delay: Duration::from_millis(10),
            calibration_samples: 1000,
            calibration_delay: Duration::from_millis(2),
            deadband: 0.1,
            sustained: Duration::from_secs(2),
        }
    }
}

pub struct MotionSensor<B: MotionBus> {
    name: String,
    bus: B,
    config: MotionConfig,
    timer: DueTimer,
    clock: SharedClock,
    initialized: bool,

    accel_offset: [f32; 3],
    gyro_offset: [f32; 3],

    /// When an axis first left the deadband; cleared once everything
    /// settles or recalibration fires.
    exceeded_since: Option<Instant>,
}

impl<B: MotionBus> MotionSensor<B> {
    pub fn new(name: impl Into<String>, bus: B, config: MotionConfig, clock: SharedClock) -> Self {
        let timer = DueTimer::new(config.interval);
        Self {
            name: name.into(),
            bus,
            config,
            timer,
            clock,
            initialized: false,
            accel_offset: [0.0; 3],
            gyro_offset: [0.0; 3],
            exceeded_since: None,
        }
    }

    /// Average a fixed number of raw samples into per-axis offsets.
    ///
    /// Blocks for `calibration_samples * calibration_delay`; accepted
    /// latency trade-off in the single-threaded polling model. Individual
    /// read failures are logged and skipped, the divisor stays the full
    /// sample budget.
    fn calibrate(&mut self) -> Result<(), SensorError> {
        if !self.initialized {
            return Err(SensorError::NotInitialized);
        }
        let samples = self.config.calibration_samples;
        info!(sensor = %self.name, samples, "starting calibration");

        let mut accel_sum = [0.0f32; 3];
        let mut gyro_sum = [0.0f32; 3];
        for i in 0..samples {
            match self.bus.sample() {
                Ok(s) => {
                    for axis in 0..3 {
                        accel_sum[axis] += s.accel[axis];
                        gyro_sum[axis] += s.gyro[axis];
                    }
                }
                Err(e) => {
                    warn!(sensor = %self.name, sample = i, error = %e, "calibration sample failed");
                }
            }
            if !self.config.calibration_delay.is_zero() {
                std::thread::sleep(self.config.calibration_delay);
            }
        }

        let n = samples as f32;
        for axis in 0..3 {
            self.accel_offset[axis] = accel_sum[axis] / n;
            self.gyro_offset[axis] = gyro_sum[axis] / n;
        }
        // At rest the vertical axis reads +1 g; fold gravity into the offset
        // so the drift detector sees zero.
        self.accel_offset[2] -= STANDARD_GRAVITY;

        info!(
            sensor = %self.name,
            accel_offset = ?self.accel_offset,
            gyro_offset = ?self.gyro_offset,
            "calibration complete"
        );
        Ok(())
    }

    fn corrected(&self, s: &MotionSample) -> ([f32; 3], [f32; 3]) {
        let accel = [
            s.accel[0] - self.accel_offset[0],
            s.accel[1] - self.accel_offset[1],
            s.accel[2] - self.accel_offset[2],
        ];
        let gyro = [
            s.gyro[0] - self.gyro_offset[0],
            s.gyro[1] - self.gyro_offset[1],
            s.gyro[2] - self.gyro_offset[2],
        ];
        (accel, gyro)
    }
}

impl<B: MotionBus> Sensor for MotionSensor<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<(), SensorError> {
        let mut attempts = 0;
        loop {
            match self.bus.probe() {
                Ok(()) => break,
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.config.init_attempts {
                        self.initialized = false;
                        return Err(SensorError::InitializationFailure(format!(
                            "handshake failed after {} attempts: {}",
                            attempts, e
                        )));
                    }
                    if !self.config.init_retry_delay.is_zero() {
                        std::thread::sleep(self.config.init_retry_delay);
                    }
                }
            }
        }

        self.initialized = true;
        self.calibrate()?;
        info!(sensor = %self.name, attempts, "motion sensor initialized");
        Ok(())
    }

    fn poll(&mut self) -> Result<(), SensorError> {
        if !self.initialized {
            return Err(SensorError::NotInitialized);
        }

        let sample = match self.bus.sample() {
            Ok(s) => s,
            Err(e) => {
                warn!(sensor = %self.name, error = %e, "drift check read failed");
                return Ok(());
            }
        };

        let (accel, gyro) = self.corrected(&sample);
        // The offset already absorbed gravity, so subtract it from the raw
        // vertical reading as well to center the check at zero.
        let drift_axes = [
            accel[0],
            accel[1],
            accel[2] - STANDARD_GRAVITY,
            gyro[0],
            gyro[1],
            gyro[2],
        ];
        let exceeded = drift_axes.iter().any(|v| v.abs() > self.config.deadband);

        if !exceeded {
            self.exceeded_since = None;
            return Ok(());
        }

        let now = self.clock.now();
        let since = match self.exceeded_since {
            None => {
                self.exceeded_since = Some(now);
                return Ok(());
            }
            Some(since) => since,
        };

        if now.duration_since(since) < self.config.sustained {
            return Ok(());
        }

        info!(
            sensor = %self.name,
            sustained_ms = self.config.sustained.as_millis() as u64,
            "axis outside deadband for sustained duration, recalibrating"
        );
        if let Err(e) = self.calibrate() {
            // Non-fatal here; the next sustained deviation will retry.
            error!(sensor = %self.name, error = %e, "automatic recalibration failed");
        }
        self.exceeded_since = None;
        Ok(())
    }

    fn read_snapshot(&mut self, force: bool, mark_consumed: bool) -> Result<Snapshot, SensorError> {
        if !self.initialized {
            return Err(SensorError::NotInitialized);
        }
        let now = self.clock.now();
        if !force && !self.timer.is_due(now) {
            return Ok(Snapshot::new(&self.name));
        }
        if mark_consumed {
            self.timer.stamp(now);
        }

        let sample = self
            .bus
            .sample()
            .map_err(|e| SensorError::ReadFailure(e.to_string()))?;
        let (accel, gyro) = self.corrected(&sample);

        let mut snapshot = Snapshot::new(&self.name);
        snapshot.set("ax", accel[0]).expect("static key");
        snapshot.set("ay", accel[1]).expect("static key");
        snapshot.set("az", accel[2]).expect("static key");
        snapshot.set("gx", gyro[0]).expect("static key");
        snapshot.set("gy", gyro[1]).expect("static key");
        snapshot.set("gz", gyro[2]).expect("static key");
        snapshot.set("temp", sample.temperature).expect("static key");
        debug!(sensor = %self.name, ?accel, ?gyro, "motion read");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::hal::HardwareError;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    /// Scriptable bus: shared handle lets tests retarget readings while the
    /// sensor owns the bus.
    #[derive(Clone)]
    struct FakeBus {
        inner: Rc<RefCell<FakeBusState>>,
    }

    struct FakeBusState {
        probe_failures: u32,
        sample: MotionSample,
        fail_samples: bool,
    }

    impl FakeBus {
        fn at_rest() -> Self {
            Self {
                inner: Rc::new(RefCell::new(FakeBusState {
                    probe_failures: 0,
                    sample: MotionSample {
                        accel: [0.01, -0.02, STANDARD_GRAVITY + 0.01],
                        gyro: [0.001, 0.0, -0.001],
                        temperature: 24.5,
                    },
                    fail_samples: false,
                })),
            }
        }

        fn set_sample(&self, sample: MotionSample) {
            self.inner.borrow_mut().sample = sample;
        }

        fn set_probe_failures(&self, n: u32) {
            self.inner.borrow_mut().probe_failures = n;
        }

        fn set_fail_samples(&self, fail: bool) {
            self.inner.borrow_mut().fail_samples = fail;
        }
    }

    impl MotionBus for FakeBus {
        fn probe(&mut self) -> Result<(), HardwareError> {
            let mut inner = self.inner.borrow_mut();
            if inner.probe_failures > 0 {
                inner.probe_failures -= 1;
                return Err(HardwareError::new("no ack"));
            }
            Ok(())
        }

        fn sample(&mut self) -> Result<MotionSample, HardwareError> {
            let inner = self.inner.borrow();
            if inner.fail_samples {
                return Err(HardwareError::new("bus stuck"));
            }
            Ok(inner.sample)
        }
    }

    fn test_config() -> MotionConfig {
        MotionConfig {
            interval: Duration::from_millis(200),
            init_attempts: 5,
            init_retry_delay: Duration::ZERO,
            calibration_samples: 4,
            calibration_delay: Duration::ZERO,
            deadband: 0.1,
            sustained: Duration::from_secs(2),
        }
    }

    fn sensor(clock: &ManualClock, bus: FakeBus) -> MotionSensor<FakeBus> {
        MotionSensor::new("imu_1", bus, test_config(), Arc::new(clock.clone()))
    }

    #[test]
    fn test_init_retries_then_succeeds() {
        let clock = ManualClock::new();
        let bus = FakeBus::at_rest();
        bus.set_probe_failures(3);
        let mut s = sensor(&clock, bus);
        assert!(s.initialize().is_ok());
    }

    #[test]
    fn test_init_exhausts_attempt_budget() {
        let clock = ManualClock::new();
        let bus = FakeBus::at_rest();
        bus.set_probe_failures(5);
        let mut s = sensor(&clock, bus);
        match s.initialize() {
            Err(SensorError::InitializationFailure(_)) => {}
            other => panic!("expected InitializationFailure, got {:?}", other),
        }
        // Still unusable afterwards.
        assert!(matches!(s.poll(), Err(SensorError::NotInitialized)));
    }

    #[test]
    fn test_calibration_zeroes_readings_at_rest() {
        let clock = ManualClock::new();
        let bus = FakeBus::at_rest();
        let mut s = sensor(&clock, bus);
        s.initialize().unwrap();

        let snap = s.read_snapshot(true, false).unwrap();
        assert_relative_eq!(snap.value("ax").unwrap(), 0.0, epsilon = 1e-5);
        assert_relative_eq!(snap.value("ay").unwrap(), 0.0, epsilon = 1e-5);
        // Vertical axis keeps gravity in the reported value; the offset only
        // removes the bias on top of it.
        assert_relative_eq!(snap.value("az").unwrap(), STANDARD_GRAVITY, epsilon = 1e-4);
        assert_relative_eq!(snap.value("gx").unwrap(), 0.0, epsilon = 1e-5);
        assert_relative_eq!(snap.value("temp").unwrap(), 24.5);
    }

    #[test]
    fn test_due_timer_contract() {
        let clock = ManualClock::new();
        let mut s = sensor(&clock, FakeBus::at_rest());
        s.initialize().unwrap();

        assert!(!s.read_snapshot(false, true).unwrap().is_empty());
        clock.advance(Duration::from_millis(100));
        assert!(s.read_snapshot(false, true).unwrap().is_empty());
        clock.advance(Duration::from_millis(100));
        assert!(!s.read_snapshot(false, true).unwrap().is_empty());
    }

    #[test]
    fn test_read_failure_reported() {
        let clock = ManualClock::new();
        let bus = FakeBus::at_rest();
        let mut s = sensor(&clock, bus.clone());
        s.initialize().unwrap();
        bus.set_fail_samples(true);
        match s.read_snapshot(true, false) {
            Err(SensorError::ReadFailure(_)) => {}
            other => panic!("expected ReadFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_at_rest_never_recalibrates() {
        let clock = ManualClock::new();
        let bus = FakeBus::at_rest();
        let mut s = sensor(&clock, bus.clone());
        s.initialize().unwrap();
        let offsets_before = s.accel_offset;

        for _ in 0..100 {
            clock.advance(Duration::from_millis(100));
            s.poll().unwrap();
        }
        assert!(s.exceeded_since.is_none());
        assert_eq!(s.accel_offset, offsets_before);
    }

    #[test]
    fn test_sustained_deviation_triggers_one_recalibration() {
        let clock = ManualClock::new();
        let bus = FakeBus::at_rest();
        let mut s = sensor(&clock, bus.clone());
        s.initialize().unwrap();

        // Device repositioned: a constant new bias on X, at rest otherwise.
        let mut shifted = bus.inner.borrow().sample;
        shifted.accel[0] += 0.5;
        bus.set_sample(shifted);

        // First poll outside the deadband starts the timer.
        s.poll().unwrap();
        assert!(s.exceeded_since.is_some());

        // Not sustained long enough yet.
        clock.advance(Duration::from_millis(1999));
        s.poll().unwrap();
        assert!(s.exceeded_since.is_some());

        // Crosses the sustained threshold: recalibrate and clear the timer.
        clock.advance(Duration::from_millis(1));
        s.poll().unwrap();
        assert!(s.exceeded_since.is_none());

        // The new bias is now the baseline, so the corrected X reads zero.
        let snap = s.read_snapshot(true, false).unwrap();
        assert_relative_eq!(snap.value("ax").unwrap(), 0.0, epsilon = 1e-5);

        // And with the baseline absorbed, further polls stay quiet.
        clock.advance(Duration::from_millis(100));
        s.poll().unwrap();
        assert!(s.exceeded_since.is_none());
    }

    #[test]
    fn test_transient_deviation_clears_timer() {
        let clock = ManualClock::new();
        let bus = FakeBus::at_rest();
        let mut s = sensor(&clock, bus.clone());
        s.initialize().unwrap();

        let rest = bus.inner.borrow().sample;
        let mut bump = rest;
        bump.accel[1] += 1.0;

        bus.set_sample(bump);
        s.poll().unwrap();
        assert!(s.exceeded_since.is_some());

        // Back at rest before the sustained threshold: timer cleared, no
        // recalibration.
        bus.set_sample(rest);
        clock.advance(Duration::from_millis(500));
        s.poll().unwrap();
        assert!(s.exceeded_since.is_none());
    }

    #[test]
    fn test_poll_survives_read_failure() {
        let clock = ManualClock::new();
        let bus = FakeBus::at_rest();
        let mut s = sensor(&clock, bus.clone());
        s.initialize().unwrap();
        bus.set_fail_samples(true);
        // Drift check read failures are logged, not escalated.
        assert!(s.poll().is_ok());
    }
}
