//! Error types for the sensor core.
//!
//! Container errors are programming-contract violations and propagate to the
//! caller untouched. Sensor lifecycle errors are intercepted by the registry
//! and escalated or downgraded per the owning entry's policy.

use thiserror::Error;

/// Errors raised by the [`Snapshot`](crate::snapshot::Snapshot) container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Key cannot be empty")]
    InvalidArgument,

    #[error("Key too long (max {0} chars)")]
    KeyTooLong(usize),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Errors raised by the sensor lifecycle contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("Sensor not initialized")]
    NotInitialized,

    #[error("Sensor initialization failed: {0}")]
    InitializationFailure(String),

    #[error("Sensor read failed: {0}")]
    ReadFailure(String),
}

/// Errors raised at the telemetry sink boundary.
///
/// A sink failure is reported at the call site and must never roll back
/// sensor state already advanced this cycle.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink rejected data: {0}")]
    Rejected(String),
}
