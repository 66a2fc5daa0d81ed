//! Generic analog input sensor.
//!
//! Stateless beyond the due timer: one hardware read per snapshot, converted
//! to volts with a linear transfer from the reference voltage.

use std::time::Duration;

use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::error::SensorError;
use crate::hal::{AnalogInput, ADC_FULL_SCALE};
use crate::sensor::{DueTimer, Sensor};
use crate::snapshot::Snapshot;

pub struct AnalogInputSensor<A: AnalogInput> {
    name: String,
    channel: A,
    reference_voltage: f32,
    timer: DueTimer,
    clock: SharedClock,
    initialized: bool,
}

impl<A: AnalogInput> AnalogInputSensor<A> {
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
            timer: DueTimer::new(interval),
            clock,
            initialized: false,
        }
    }
}

impl<A: AnalogInput> Sensor for AnalogInputSensor<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<(), SensorError> {
        // Analog channels need no bring-up; this exists for contract
        // consistency.
        self.initialized = true;
        info!(sensor = %self.name, "analog input initialized");
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
        let voltage = f32::from(raw) / f32::from(ADC_FULL_SCALE) * self.reference_voltage;

        let mut snapshot = Snapshot::new(&self.name);
        snapshot.set("voltage", voltage).expect("static key");
        snapshot.set("raw", f32::from(raw)).expect("static key");
        debug!(sensor = %self.name, raw, voltage, "analog read");
        Ok(snapshot)
    }
}
