//! Linux IIO sysfs hardware backends.
//!
//! Implements the core hardware seams over the kernel's industrial I/O
//! interface: ADC channels are single `in_voltageN_raw` files, inertial
//! units expose per-axis `_raw` files plus scale factors under one device
//! directory.

use std::path::{Path, PathBuf};

use sentra_core::hal::{AnalogInput, HardwareError, MotionBus, MotionSample};

fn read_trimmed(path: &Path) -> Result<String, HardwareError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| HardwareError::new(format!("{}: {}", path.display(), e)))
}

fn read_f32(path: &Path) -> Result<f32, HardwareError> {
    let raw = read_trimmed(path)?;
    raw.parse::<f32>()
        .map_err(|e| HardwareError::new(format!("{}: bad value '{}': {}", path.display(), raw, e)))
}

/// One raw ADC channel file.
pub struct IioAdcChannel {
    raw_path: PathBuf,
}

impl IioAdcChannel {
    pub fn new(raw_path: impl Into<PathBuf>) -> Self {
        Self {
            raw_path: raw_path.into(),
        }
    }
}

impl AnalogInput for IioAdcChannel {
    fn read_raw(&mut self) -> Result<u16, HardwareError> {
        let raw = read_trimmed(&self.raw_path)?;
        raw.parse::<u16>().map_err(|e| {
            HardwareError::new(format!(
                "{}: bad sample '{}': {}",
                self.raw_path.display(),
                raw,
                e
            ))
        })
    }
}

/// Six-axis IMU exposed as an IIO device directory.
pub struct IioMotionBus {
    dir: PathBuf,
    accel_scale: f32,
    gyro_scale: f32,
    temp_scale: f32,
}

impl IioMotionBus {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            accel_scale: 1.0,
            gyro_scale: 1.0,
            temp_scale: 0.001,
        }
    }

    fn axis(&self, prefix: &str, axis: char) -> Result<f32, HardwareError> {
        read_f32(&self.dir.join(format!("{}_{}_raw", prefix, axis)))
    }
}

impl MotionBus for IioMotionBus {
    fn probe(&mut self) -> Result<(), HardwareError> {
        // A readable name file means the device is bound; cache the scale
        // factors while we are here.
        let name = read_trimmed(&self.dir.join("name"))?;
        self.accel_scale = read_f32(&self.dir.join("in_accel_scale"))?;
        self.gyro_scale = read_f32(&self.dir.join("in_anglvel_scale"))?;
        if let Ok(scale) = read_f32(&self.dir.join("in_temp_scale")) {
            self.temp_scale = scale;
        }
        tracing::debug!(device = %name, dir = %self.dir.display(), "IIO motion device bound");
        Ok(())
    }

    fn sample(&mut self) -> Result<MotionSample, HardwareError> {
        let accel = [
            self.axis("in_accel", 'x')? * self.accel_scale,
            self.axis("in_accel", 'y')? * self.accel_scale,
            self.axis("in_accel", 'z')? * self.accel_scale,
        ];
        let gyro = [
            self.axis("in_anglvel", 'x')? * self.gyro_scale,
            self.axis("in_anglvel", 'y')? * self.gyro_scale,
            self.axis("in_anglvel", 'z')? * self.gyro_scale,
        ];
        let temperature = read_f32(&self.dir.join("in_temp_raw"))? * self.temp_scale;
        Ok(MotionSample {
            accel,
            gyro,
            temperature,
        })
    }
}
