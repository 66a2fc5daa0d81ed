//! Acoustic level sensor over an analog microphone stage.
//!
//! Samples asynchronously: each `poll` takes exactly one instantaneous
//! sample while a window is open, and the window closes once the configured
//! interval has elapsed. The interval doubles as the sampling cadence and
//! the window length. At window close the mean and peak amplitudes are
//! converted to dB SPL.
//!
//! Reads never expose a window in progress: a non-forced read during
//! sampling reports nothing, and a forced one returns the previous completed
//! window's values. Stale-but-consistent beats partial.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::error::SensorError;
use crate::hal::{AnalogInput, ADC_FULL_SCALE};
use crate::sensor::{DueTimer, Sensor};
use crate::snapshot::Snapshot;

/// Electret capsule sensitivity: -44 dBV/Pa = 6.31 mV/Pa.
const MIC_SENSITIVITY_V_PER_PA: f32 = 0.00631;
/// Sound pressure level the sensitivity figure is referenced to.
const DB_SPL_REF: f32 = 94.0;

pub struct SoundLevelSensor<A: AnalogInput> {
    name: String,
    channel: A,
    reference_voltage: f32,
    /// Linear gain of the amplifier stage in front of the ADC.
    gain: f32,
    timer: DueTimer,
    clock: SharedClock,
    initialized: bool,

    sampling: bool,
    window_start: Option<Instant>,

    // Accumulators for the window in progress.
    signal_max: u16,
    signal_min: u16,
    sum_amplitude: f32,
    peak_amplitude: f32,
    sample_count: u32,

    // Results of the last completed window.
    mean_db_spl: f32,
    peak_db_spl: f32,
}

impl<A: AnalogInput> SoundLevelSensor<A> {
    pub fn new(
        name: impl Into<String>,
        channel: A,
        reference_voltage: f32,
        gain: f32,
        window: Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            name: name.into(),
            channel,
            reference_voltage,
            gain,
            timer: DueTimer::new(window),
            clock,
            initialized: false,
            sampling: false,
            window_start: None,
            signal_max: 0,
            signal_min: ADC_FULL_SCALE,
            sum_amplitude: 0.0,
            peak_amplitude: 0.0,
            sample_count: 0,
            mean_db_spl: 0.0,
            peak_db_spl: 0.0,
        }
    }

    fn reset_accumulators(&mut self) {
        self.signal_max = 0;
        self.signal_min = ADC_FULL_SCALE;
        self.sum_amplitude = 0.0;
        self.peak_amplitude = 0.0;
        self.sample_count = 0;
    }

    fn take_sample(&mut self) {
        let raw = match self.channel.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(sensor = %self.name, error = %e, "sample dropped");
                return;
            }
        };
        if raw > self.signal_max {
            self.signal_max = raw;
        }
        if raw < self.signal_min {
            self.signal_min = raw;
        }
        let volts = f32::from(raw) / f32::from(ADC_FULL_SCALE) * self.reference_voltage;
        // The microphone output is biased to mid-rail; amplitude is the
        // deviation from that bias.
        let bias = self.reference_voltage / 2.0;
        let amplitude = (volts - bias).abs();
        self.sum_amplitude += amplitude;
        if amplitude > self.peak_amplitude {
            self.peak_amplitude = amplitude;
        }
        self.sample_count += 1;
    }

    fn close_window(&mut self) {
        let full_scale_ref = MIC_SENSITIVITY_V_PER_PA * self.gain;
        let mean_amplitude = if self.sample_count > 0 {
            self.sum_amplitude / self.sample_count as f32
        } else {
            0.0
        };
        self.mean_db_spl = db_spl(mean_amplitude, full_scale_ref);
        self.peak_db_spl = db_spl(self.peak_amplitude, full_scale_ref);
        debug!(
            sensor = %self.name,
            samples = self.sample_count,
            peak_to_peak = self.signal_max.saturating_sub(self.signal_min),
            mean_db_spl = self.mean_db_spl,
            peak_db_spl = self.peak_db_spl,
            "sampling window closed"
        );
    }
}

fn db_spl(amplitude: f32, reference: f32) -> f32 {
    if amplitude > 0.0 {
        20.0 * (amplitude / reference).log10() + DB_SPL_REF
    } else {
        0.0
    }
}

impl<A: AnalogInput> Sensor for SoundLevelSensor<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<(), SensorError> {
        self.initialized = true;
        self.reset_accumulators();
        info!(sensor = %self.name, "sound level sensor initialized");
        Ok(())
    }

    fn poll(&mut self) -> Result<(), SensorError> {
        if !self.initialized {
            return Err(SensorError::NotInitialized);
        }
        let now = self.clock.now();

        if !self.sampling && self.timer.is_due(now) {
            self.sampling = true;
            self.window_start = Some(now);
            self.reset_accumulators();
            debug!(sensor = %self.name, "sampling window opened");
        }

        if self.sampling {
            let start = self.window_start.unwrap_or(now);
            if now.duration_since(start) < self.timer.interval() {
                self.take_sample();
            } else {
                self.close_window();
                self.sampling = false;
                self.timer.stamp(now);
            }
        }
        Ok(())
    }

    /// The window state machine owns the due timer, so `mark_consumed` has
    /// no effect here; readiness means "no window in progress".
    fn read_snapshot(
        &mut self,
        force: bool,
        _mark_consumed: bool,
    ) -> Result<Snapshot, SensorError> {
        if !self.initialized {
            return Err(SensorError::NotInitialized);
        }
        if self.sampling && !force {
            return Ok(Snapshot::new(&self.name));
        }
        let mut snapshot = Snapshot::new(&self.name);
        snapshot.set("mean_db", self.mean_db_spl).expect("static key");
        snapshot.set("peak_db", self.peak_db_spl).expect("static key");
        Ok(snapshot)
    }
}
