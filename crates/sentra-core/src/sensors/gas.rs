//! Metal-oxide gas sensor on an analog channel.
//!
//! The heater element's resistance drops in the presence of target gases.
//! Concentration is estimated per gas from the sensing/baseline resistance
//! ratio with an exponential regression: `ppm = a * ratio^b`.

use std::time::Duration;

use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::error::SensorError;
use crate::hal::{AnalogInput, ADC_FULL_SCALE};
use crate::sensor::{DueTimer, Sensor};
use crate::snapshot::Snapshot;

/// Regression coefficients for one target gas.
#[derive(Debug, Clone, Copy)]
pub struct GasCurve {
    pub key: &'static str,
    pub a: f32,
    pub b: f32,
}

/// Factory curves for the MQ-135 family.
pub const MQ135_CURVES: &[GasCurve] = &[
    GasCurve { key: "CO", a: 605.18, b: -3.937 },
    GasCurve { key: "Alcohol", a: 77.255, b: -3.18 },
    GasCurve { key: "CO2", a: 110.47, b: -2.862 },
    GasCurve { key: "Toluen", a: 44.947, b: -3.445 },
    GasCurve { key: "NH4", a: 102.2, b: -2.473 },
    GasCurve { key: "Aceton", a: 34.668, b: -3.369 },
];

pub struct GasSensor<A: AnalogInput> {
    name: String,
    channel: A,
    reference_voltage: f32,
    /// Load resistor of the divider, kΩ.
    load_resistance: f32,
    /// Baseline resistance in clean air, kΩ.
    // TODO: derive r0 from a clean-air warm-up average instead of a fixed
    // default.
    r0: f32,
    curves: Vec<GasCurve>,
    timer: DueTimer,
    clock: SharedClock,
    initialized: bool,
}

impl<A: AnalogInput> GasSensor<A> {
    pub fn new(
        name: impl Into<String>,
        channel: A,
        reference_voltage: f32,
        interval: Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            name: name.into(),
            channel,
            reference_voltage,
            load_resistance: 10.0,
            r0: 10.0,
            curves: MQ135_CURVES.to_vec(),
            timer: DueTimer::new(interval),
            clock,
            initialized: false,
        }
    }

    /// Override the clean-air baseline resistance (kΩ).
    pub fn with_r0(mut self, r0: f32) -> Self {
        self.r0 = r0;
        self
    }

    /// Replace the default curve set.
    pub fn with_curves(mut self, curves: Vec<GasCurve>) -> Self {
        self.curves = curves;
        self
    }

    /// Sensing resistance (kΩ) from the divider voltage.
    fn sensing_resistance(&self, volts: f32) -> f32 {
        if volts <= 0.0 {
            return f32::INFINITY;
        }
        (self.reference_voltage - volts) / volts * self.load_resistance
    }
}

/// Exponential regression over the resistance ratio.
fn ppm(curve: &GasCurve, ratio: f32) -> f32 {
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0.0;
    }
    curve.a * ratio.powf(curve.b)
}

impl<A: AnalogInput> Sensor for GasSensor<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<(), SensorError> {
        self.initialized = true;
        info!(sensor = %self.name, r0 = self.r0, curves = self.curves.len(), "gas sensor initialized");
        Ok(())
    }

    fn poll(&mut self) -> Result<(), SensorError> {
        if !self.initialized {
            return Err(SensorError::NotInitialized);
        }
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

        let raw = self
            .channel
            .read_raw()
            .map_err(|e| SensorError::ReadFailure(e.to_string()))?;
        let volts = f32::from(raw) / f32::from(ADC_FULL_SCALE) * self.reference_voltage;
        let ratio = self.sensing_resistance(volts) / self.r0;

        let mut snapshot = Snapshot::new(&self.name);
        for curve in &self.curves {
            snapshot
                .set(curve.key, ppm(curve, ratio))
                .map_err(|e| SensorError::ReadFailure(e.to_string()))?;
        }
        debug!(sensor = %self.name, raw, ratio, "gas read");
        Ok(snapshot)
    }
}
