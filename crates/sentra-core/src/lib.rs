//! Sentra core - sensor sampling and orchestration.
//!
//! Periodically samples heterogeneous physical sensors, normalizes each
//! reading into an ordered key/value [`Snapshot`], and hands non-empty
//! snapshots to a [`TelemetrySink`]. Single-threaded by design: one driver
//! loop invokes the registry on a fixed cadence, no locking, no preemption.

pub mod clock;
pub mod error;
pub mod hal;
pub mod registry;
pub mod sensor;
pub mod sensors;
pub mod sink;
pub mod snapshot;

pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use error::{SensorError, SinkError, SnapshotError};
pub use registry::SensorRegistry;
pub use sensor::{DueTimer, Sensor};
pub use sink::{NullSink, TelemetrySink};
pub use snapshot::{Snapshot, SnapshotEntry, MAX_KEY_LEN};
