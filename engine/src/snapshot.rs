//! Snapshot format for persisting local store state.
//!
//! Snapshots are the bridge between the in-memory collections and disk. They
//! serialize deterministically: entity types are ordered by name and records
//! keep their insertion order.

use crate::{error::StoreResult, EntityType, Record, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of every collection in a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Records per entity type, in insertion order
    pub collections: BTreeMap<EntityType, Vec<Record>>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collections: BTreeMap::new(),
        }
    }

    /// Append a record to its collection.
    pub fn add_record(&mut self, entity_type: &str, record: Record) {
        self.collections
            .entry(entity_type.to_string())
            .or_default()
            .push(record);
    }

    /// Count total records across all collections.
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Check the snapshot is readable by this version.
    pub fn validate(&self) -> StoreResult<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported snapshot format version {}",
                self.format_version
            )));
        }
        for (entity_type, records) in &self.collections {
            let mut seen = std::collections::HashSet::with_capacity(records.len());
            for record in records {
                if !seen.insert(record.id.as_str()) {
                    return Err(StoreError::Corrupt(format!(
                        "duplicate {} record {}",
                        entity_type, record.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON and validate.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Read a snapshot file. A missing file is an empty snapshot.
    pub fn load(path: &Path) -> StoreResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the snapshot atomically: temp file in the same directory, fsync,
    /// then rename over the target.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let json = self.to_json()?;
        let tmp = path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
