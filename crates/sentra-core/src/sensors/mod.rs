//! Concrete sensor variants.
//!
//! Each variant implements the [`Sensor`](crate::sensor::Sensor) contract
//! over a hardware seam from [`hal`](crate::hal); nothing here touches real
//! hardware directly.

pub mod analog;
pub mod gas;
pub mod motion;
pub mod sound;

pub use analog::AnalogInputSensor;
pub use gas::{GasCurve, GasSensor};
pub use motion::{MotionConfig, MotionSensor};
pub use sound::SoundLevelSensor;
