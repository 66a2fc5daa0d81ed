//! Drives registered sensors through their lifecycle with per-entry
//! failure-escalation policy.
//!
//! Registration order is preserved and doubles as the reporting order. The
//! escalation flags are the sole partial-failure mechanism: a critical
//! sensor halts the pass on failure, a best-effort one is logged and
//! retried next cycle.

use tracing::{debug, error, info, warn};

use crate::error::SensorError;
use crate::sensor::Sensor;
use crate::snapshot::Snapshot;

/// One registered sensor and its escalation policy.
pub struct SensorSlot {
    sensor: Box<dyn Sensor>,
    escalate_on_init: bool,
    escalate_on_update: bool,
}

/// Ordered collection of sensors, registered once at startup.
#[derive(Default)]
pub struct SensorRegistry {
    slots: Vec<SensorSlot>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Register a sensor with its escalation policy. Sensors are never
    /// removed.
    pub fn register(
        &mut self,
        sensor: Box<dyn Sensor>,
        escalate_on_init: bool,
        escalate_on_update: bool,
    ) {
        debug!(sensor = sensor.name(), escalate_on_init, escalate_on_update, "sensor registered");
        self.slots.push(SensorSlot {
            sensor,
            escalate_on_init,
            escalate_on_update,
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Initialize every sensor in registration order.
    ///
    /// An initialization failure aborts the whole sequence when the entry
    /// escalates on init; otherwise the sensor is left uninitialized and the
    /// loop continues.
    pub fn initialize_all(&mut self) -> Result<(), SensorError> {
        for slot in &mut self.slots {
            info!(sensor = slot.sensor.name(), "initializing sensor");
            if let Err(e) = slot.sensor.initialize() {
                error!(sensor = slot.sensor.name(), error = %e, "sensor init failed");
                if slot.escalate_on_init {
                    error!("critical sensor failed to initialize, aborting");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Advance every sensor's internal state once.
    pub fn poll_all(&mut self) -> Result<(), SensorError> {
        for slot in &mut self.slots {
            if let Err(e) = slot.sensor.poll() {
                error!(sensor = slot.sensor.name(), error = %e, "sensor poll failed");
                if slot.escalate_on_update {
                    error!("critical sensor failed to poll, aborting cycle");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Read every sensor in order, returning the non-empty snapshots.
    ///
    /// Empty snapshots ("not yet due") are dropped silently. Read failures
    /// follow the entry's update escalation flag.
    pub fn collect_all(
        &mut self,
        force: bool,
        mark_consumed: bool,
    ) -> Result<Vec<Snapshot>, SensorError> {
        let mut snapshots = Vec::new();
        for slot in &mut self.slots {
            match slot.sensor.read_snapshot(force, mark_consumed) {
                Ok(snapshot) => {
                    if snapshot.is_empty() {
                        continue;
                    }
                    debug!(sensor = slot.sensor.name(), entries = snapshot.len(), "sensor read");
                    snapshots.push(snapshot);
                }
                Err(e) => {
                    error!(sensor = slot.sensor.name(), error = %e, "sensor read failed");
                    if slot.escalate_on_update {
                        error!("critical sensor failed to read, aborting cycle");
                        return Err(e);
                    }
                }
            }
        }
        Ok(snapshots)
    }

    /// Forced read-and-log pass over every sensor, ignoring due timers and
    /// leaving them unstamped. Used by the slow reporting cadence.
    pub fn log_all(&mut self) -> Result<(), SensorError> {
        let snapshots = self.collect_all(true, false)?;
        for snapshot in &snapshots {
            for entry in snapshot {
                info!(
                    sensor = snapshot.sensor_name(),
                    key = %entry.key,
                    value = entry.value,
                    "sensor value"
                );
            }
        }
        if snapshots.is_empty() {
            warn!("no sensor produced values for the logging pass");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal scripted sensor for registry behavior.
    struct ScriptedSensor {
        name: String,
        fail_init: bool,
        fail_read: bool,
        due: bool,
        reads: u32,
        initialized: bool,
    }

    impl ScriptedSensor {
        fn ok(name: &str) -> Self {
            Self {
                name: name.to_string(),
                fail_init: false,
                fail_read: false,
                due: true,
                reads: 0,
                initialized: false,
            }
        }

        fn failing_read(name: &str) -> Self {
            Self {
                fail_read: true,
                ..Self::ok(name)
            }
        }

        fn failing_init(name: &str) -> Self {
            Self {
                fail_init: true,
                ..Self::ok(name)
            }
        }

        fn not_due(name: &str) -> Self {
            Self {
                due: false,
                ..Self::ok(name)
            }
        }
    }

    impl Sensor for ScriptedSensor {
        fn name(&self) -> &str {
            &self.name
        }

        fn initialize(&mut self) -> Result<(), SensorError> {
            if self.fail_init {
                return Err(SensorError::InitializationFailure("no device".into()));
            }
            self.initialized = true;
            Ok(())
        }

        fn poll(&mut self) -> Result<(), SensorError> {
            if !self.initialized {
                return Err(SensorError::NotInitialized);
            }
            Ok(())
        }

        fn read_snapshot(
            &mut self,
            force: bool,
            _mark_consumed: bool,
        ) -> Result<Snapshot, SensorError> {
            if !self.initialized {
                return Err(SensorError::NotInitialized);
            }
            if self.fail_read {
                return Err(SensorError::ReadFailure("bus stuck".into()));
            }
            self.reads += 1;
            if !self.due && !force {
                return Ok(Snapshot::new(&self.name));
            }
            let mut snap = Snapshot::new(&self.name);
            snap.set("value", self.reads as f32).unwrap();
            Ok(snap)
        }
    }

    #[test]
    fn test_collect_preserves_registration_order() {
        let mut registry = SensorRegistry::new();
        registry.register(Box::new(ScriptedSensor::ok("first")), true, true);
        registry.register(Box::new(ScriptedSensor::ok("second")), true, true);
        registry.register(Box::new(ScriptedSensor::ok("third")), true, true);
        registry.initialize_all().unwrap();

        let snapshots = registry.collect_all(false, true).unwrap();
        let names: Vec<&str> = snapshots.iter().map(|s| s.sensor_name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_collect_drops_empty_snapshots() {
        let mut registry = SensorRegistry::new();
        registry.register(Box::new(ScriptedSensor::ok("due")), true, true);
        registry.register(Box::new(ScriptedSensor::not_due("idle")), true, true);
        registry.initialize_all().unwrap();

        let snapshots = registry.collect_all(false, true).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].sensor_name(), "due");
        assert!(snapshots.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn test_force_collects_not_due_sensors() {
        let mut registry = SensorRegistry::new();
        registry.register(Box::new(ScriptedSensor::not_due("idle")), true, true);
        registry.initialize_all().unwrap();

        let snapshots = registry.collect_all(true, false).unwrap();
        assert_eq!(snapshots.len(), 1);
    }

    #[test]
    fn test_best_effort_read_failure_is_skipped() {
        let mut registry = SensorRegistry::new();
        registry.register(Box::new(ScriptedSensor::ok("good_a")), true, true);
        registry.register(Box::new(ScriptedSensor::failing_read("flaky")), true, false);
        registry.register(Box::new(ScriptedSensor::ok("good_b")), true, true);
        registry.initialize_all().unwrap();

        let snapshots = registry.collect_all(false, true).unwrap();
        let names: Vec<&str> = snapshots.iter().map(|s| s.sensor_name()).collect();
        assert_eq!(names, vec!["good_a", "good_b"]);
    }

    #[test]
    fn test_critical_read_failure_aborts_pass() {
        let mut registry = SensorRegistry::new();
        registry.register(Box::new(ScriptedSensor::ok("good_a")), true, true);
        registry.register(Box::new(ScriptedSensor::failing_read("critical")), true, true);
        registry.register(Box::new(ScriptedSensor::ok("good_b")), true, true);
        registry.initialize_all().unwrap();

        match registry.collect_all(false, true) {
            Err(SensorError::ReadFailure(_)) => {}
            other => panic!("expected ReadFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_best_effort_init_failure_continues() {
        let mut registry = SensorRegistry::new();
        registry.register(Box::new(ScriptedSensor::failing_init("optional")), false, false);
        registry.register(Box::new(ScriptedSensor::ok("required")), true, true);

        registry.initialize_all().unwrap();

        // The uninitialized sensor keeps failing reads but stays non-fatal.
        let snapshots = registry.collect_all(false, true).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].sensor_name(), "required");
    }

    #[test]
    fn test_critical_init_failure_aborts_startup() {
        let mut registry = SensorRegistry::new();
        registry.register(Box::new(ScriptedSensor::failing_init("critical")), true, true);
        registry.register(Box::new(ScriptedSensor::ok("never_reached")), true, true);

        match registry.initialize_all() {
            Err(SensorError::InitializationFailure(_)) => {}
            other => panic!("expected InitializationFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_poll_all_escalation() {
        let mut registry = SensorRegistry::new();
        // Never initialized, escalates on update.
        registry.register(Box::new(ScriptedSensor::failing_init("broken")), false, true);
        registry.initialize_all().unwrap();

        assert!(matches!(
            registry.poll_all(),
            Err(SensorError::NotInitialized)
        ));
    }

    #[test]
    fn test_log_all_reads_forced() {
        let mut registry = SensorRegistry::new();
        registry.register(Box::new(ScriptedSensor::not_due("idle")), true, true);
        registry.initialize_all().unwrap();
        registry.log_all().unwrap();
    }
}
