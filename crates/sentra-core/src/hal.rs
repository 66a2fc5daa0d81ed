//! Hardware transducer seams.
//!
//! Sensor logic talks to the physical world through these traits only, so
//! every variant can be exercised against fakes. Real backends (Linux IIO
//! sysfs) live in the daemon crate.

use thiserror::Error;

/// Full-scale raw value of a 12-bit ADC.
pub const ADC_FULL_SCALE: u16 = 4095;

/// A failed hardware transaction (bus error, missing device, bad register).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Hardware transaction failed: {0}")]
pub struct HardwareError(pub String);

impl HardwareError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Single-channel analog input. One call is one instantaneous, non-blocking
/// conversion.
pub trait AnalogInput {
    /// Read one raw ADC sample in `0..=ADC_FULL_SCALE`.
    fn read_raw(&mut self) -> Result<u16, HardwareError>;
}

/// One instantaneous reading from a six-axis inertial unit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionSample {
    /// Acceleration per axis, m/s².
    pub accel: [f32; 3],
    /// Angular velocity per axis, rad/s.
    pub gyro: [f32; 3],
    /// Die temperature, °C.
    pub temperature: f32,
}

/// Transport to an inertial measurement unit.
pub trait MotionBus {
    /// Hardware handshake; cheap, may be retried.
    fn probe(&mut self) -> Result<(), HardwareError>;

    /// Read one instantaneous sample.
    fn sample(&mut self) -> Result<MotionSample, HardwareError>;
}
