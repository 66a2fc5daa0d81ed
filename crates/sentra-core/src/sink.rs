//! Telemetry sink boundary.
//!
//! The sink is an external collaborator: it accepts one finished snapshot
//! plus a device tag per call and may buffer or fail internally. A sink
//! failure is reported at the call site and never rolls back sensor state
//! already advanced this cycle.

use crate::error::SinkError;
use crate::snapshot::Snapshot;

/// Downstream consumer of finished snapshots.
pub trait TelemetrySink {
    /// Record one snapshot for the given device.
    fn record(&mut self, device: &str, snapshot: &Snapshot) -> Result<(), SinkError>;
}

/// Sink that drops everything; placeholder for dry runs.
#[derive(Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&mut self, _device: &str, _snapshot: &Snapshot) -> Result<(), SinkError> {
        Ok(())
    }
}
