//! Ordered key/value snapshot of one sensor's readings for one cycle.
//!
//! Entries are stored in a plain `Vec` in insertion order; all lookups are
//! linear scans over a handful of entries. An empty snapshot is the canonical
//! "nothing to report" sentinel used throughout the orchestration layer
//! instead of an `Option`.

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// Maximum key length, exclusive. A key of this length or longer is rejected.
pub const MAX_KEY_LEN: usize = 8;

/// One reading inside a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: f32,
}

/// One cycle's worth of a sensor's readings.
///
/// Constructed fresh on every read call and discarded after being handed to
/// the sink; never retained by a sensor across cycles. Keys are unique and
/// iteration order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    sensor_name: String,
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Create an empty snapshot owned by the named sensor.
    pub fn new(sensor_name: impl Into<String>) -> Self {
        Self {
            sensor_name: sensor_name.into(),
            entries: Vec::new(),
        }
    }

    /// Display name of the sensor that produced this snapshot.
    pub fn sensor_name(&self) -> &str {
        &self.sensor_name
    }

    fn check_key(key: &str) -> Result<(), SnapshotError> {
        if key.is_empty() {
            return Err(SnapshotError::InvalidArgument);
        }
        if key.len() >= MAX_KEY_LEN {
            return Err(SnapshotError::KeyTooLong(MAX_KEY_LEN));
        }
        Ok(())
    }

    /// Upsert a value. An existing key is overwritten in place (its position
    /// among the entries does not change); a new key is appended.
    pub fn set(&mut self, key: &str, value: f32) -> Result<(), SnapshotError> {
        Self::check_key(key)?;
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.value = value;
            return Ok(());
        }
        self.entries.push(SnapshotEntry {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    /// Look up a value by key.
    pub fn value(&self, key: &str) -> Result<f32, SnapshotError> {
        if key.is_empty() {
            return Err(SnapshotError::InvalidArgument);
        }
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value)
            .ok_or_else(|| SnapshotError::KeyNotFound(key.to_string()))
    }

    /// Look up a value by insertion index.
    pub fn value_at(&self, index: usize) -> Result<f32, SnapshotError> {
        self.entries
            .get(index)
            .map(|e| e.value)
            .ok_or(SnapshotError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Look up a key by insertion index.
    pub fn key_at(&self, index: usize) -> Result<&str, SnapshotError> {
        self.entries
            .get(index)
            .map(|e| e.key.as_str())
            .ok_or(SnapshotError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Whether the key is present.
    pub fn has(&self, key: &str) -> Result<bool, SnapshotError> {
        if key.is_empty() {
            return Err(SnapshotError::InvalidArgument);
        }
        Ok(self.entries.iter().any(|e| e.key == key))
    }

    /// Remove an entry, closing the order gap.
    pub fn remove(&mut self, key: &str) -> Result<(), SnapshotError> {
        if key.is_empty() {
            return Err(SnapshotError::InvalidArgument);
        }
        match self.entries.iter().position(|e| e.key == key) {
            Some(idx) => {
                self.entries.remove(idx);
                Ok(())
            }
            None => Err(SnapshotError::KeyNotFound(key.to_string())),
        }
    }

    /// Remove all entries. Idempotent.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move the contents out, leaving this snapshot empty.
    pub fn take(&mut self) -> Snapshot {
        Snapshot {
            sensor_name: self.sensor_name.clone(),
            entries: std::mem::take(&mut self.entries),
        }
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a SnapshotEntry;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
