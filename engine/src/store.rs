//! Local store capability and the provided implementations.
//!
//! The store is pure capability: get, put, delete and list by key, each call
//! its own atomic unit. Records are namespaced by entity type and listed in
//! insertion order. Policy lives in the engine.

use crate::{
    error::StoreResult, snapshot::StoreSnapshot, EntityType, Record, RecordId, StoreError,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Durable key/value persistence of entity records.
///
/// A completed `put` or `delete` must survive a crash before the next call.
pub trait LocalStore: Send + Sync {
    /// Get a record by entity type and id.
    fn get(&self, entity_type: &str, id: &str) -> StoreResult<Option<Record>>;

    /// Insert or replace a record. Replacing keeps the original position.
    fn put(&self, entity_type: &str, record: &Record) -> StoreResult<()>;

    /// Delete a record. Deleting an absent id is not an error.
    fn delete(&self, entity_type: &str, id: &str) -> StoreResult<()>;

    /// Move the record stored under `old_id` to `record.id`.
    ///
    /// On failure the old record must still be readable. The default writes
    /// the new key before deleting the old one, so the record moves to the
    /// end of the listing; the provided stores keep its position.
    fn rekey(&self, entity_type: &str, old_id: &str, record: &Record) -> StoreResult<()> {
        self.put(entity_type, record)?;
        if old_id != record.id {
            self.delete(entity_type, old_id)?;
        }
        Ok(())
    }

    /// All records of an entity type, in insertion order.
    fn list_all(&self, entity_type: &str) -> StoreResult<Vec<Record>>;

    /// Release the handle. Later calls fail with [`StoreError::Closed`].
    fn close(&self) -> StoreResult<()>;

    /// Drop all stored data.
    fn destroy(&self) -> StoreResult<()>;
}

/// Records of one entity type, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    order: Vec<RecordId>,
    records: HashMap<RecordId, Record>,
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a record by ID.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    /// Insert a record, keeping its position when it already exists.
    pub fn insert(&mut self, record: Record) {
        if !self.records.contains_key(&record.id) {
            self.order.push(record.id.clone());
        }
        self.records.insert(record.id.clone(), record);
    }

    /// Remove a record, returning it.
    pub fn remove(&mut self, id: &str) -> Option<Record> {
        let removed = self.records.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    /// Replace the record under `old_id` with `record`, in place.
    ///
    /// Any other record already under `record.id` is dropped.
    pub fn rekey(&mut self, old_id: &str, record: Record) {
        if old_id != record.id && self.records.remove(&record.id).is_some() {
            self.order.retain(|existing| existing != &record.id);
        }
        match self.order.iter().position(|existing| existing == old_id) {
            Some(pos) => {
                self.records.remove(old_id);
                self.order[pos] = record.id.clone();
                self.records.insert(record.id.clone(), record);
            }
            None => self.insert(record),
        }
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

type Collections = HashMap<EntityType, Collection>;

fn lock(collections: &Mutex<Collections>) -> StoreResult<MutexGuard<'_, Collections>> {
    collections
        .lock()
        .map_err(|_| StoreError::Corrupt("store lock poisoned".into()))
}

/// In-memory store. Fast, not durable across processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self) -> StoreResult<MutexGuard<'_, Collections>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        lock(&self.collections)
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, entity_type: &str, id: &str) -> StoreResult<Option<Record>> {
        let collections = self.open()?;
        Ok(collections
            .get(entity_type)
            .and_then(|c| c.get(id))
            .cloned())
    }

    fn put(&self, entity_type: &str, record: &Record) -> StoreResult<()> {
        let mut collections = self.open()?;
        collections
            .entry(entity_type.to_string())
            .or_default()
            .insert(record.clone());
        Ok(())
    }

    fn delete(&self, entity_type: &str, id: &str) -> StoreResult<()> {
        let mut collections = self.open()?;
        if let Some(collection) = collections.get_mut(entity_type) {
            collection.remove(id);
        }
        Ok(())
    }

    fn rekey(&self, entity_type: &str, old_id: &str, record: &Record) -> StoreResult<()> {
        let mut collections = self.open()?;
        collections
            .entry(entity_type.to_string())
            .or_default()
            .rekey(old_id, record.clone());
        Ok(())
    }

    fn list_all(&self, entity_type: &str) -> StoreResult<Vec<Record>> {
        let collections = self.open()?;
        Ok(collections
            .get(entity_type)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&self) -> StoreResult<()> {
        lock(&self.collections)?.clear();
        Ok(())
    }
}

/// File-backed store.
///
/// Keeps the same layout as [`MemoryStore`] and writes a [`StoreSnapshot`]
/// after every mutation. A failed write leaves both the file and the
/// in-memory state as they were.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    collections: Mutex<Collections>,
    closed: AtomicBool,
}

impl FileStore {
    /// Open or create a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let snapshot = StoreSnapshot::load(&path)?;
        let mut collections = Collections::new();
        for (entity_type, records) in snapshot.collections {
            let collection: &mut Collection = collections.entry(entity_type).or_default();
            for record in records {
                collection.insert(record);
            }
        }

        tracing::debug!(path = %path.display(), "Opened file store");

        Ok(Self {
            path,
            collections: Mutex::new(collections),
            closed: AtomicBool::new(false),
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> StoreResult<MutexGuard<'_, Collections>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        lock(&self.collections)
    }

    fn snapshot(collections: &Collections) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::new();
        for (entity_type, collection) in collections {
            for record in collection.iter() {
                snapshot.add_record(entity_type, record.clone());
            }
        }
        snapshot
    }

    /// Apply a mutation to one collection and persist, rolling the collection
    /// back if the write fails.
    fn mutate(&self, entity_type: &str, f: impl FnOnce(&mut Collection)) -> StoreResult<()> {
        let mut collections = self.guard()?;
        let entry = collections.entry(entity_type.to_string()).or_default();
        let before = entry.clone();
        f(entry);

        if let Err(e) = Self::snapshot(&collections).save(&self.path) {
            collections.insert(entity_type.to_string(), before);
            return Err(e);
        }
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, entity_type: &str, id: &str) -> StoreResult<Option<Record>> {
        let collections = self.guard()?;
        Ok(collections
            .get(entity_type)
            .and_then(|c| c.get(id))
            .cloned())
    }

    fn put(&self, entity_type: &str, record: &Record) -> StoreResult<()> {
        self.mutate(entity_type, |c| c.insert(record.clone()))
    }

    fn delete(&self, entity_type: &str, id: &str) -> StoreResult<()> {
        self.mutate(entity_type, |c| {
            c.remove(id);
        })
    }

    fn rekey(&self, entity_type: &str, old_id: &str, record: &Record) -> StoreResult<()> {
        self.mutate(entity_type, |c| c.rekey(old_id, record.clone()))
    }

    fn list_all(&self, entity_type: &str) -> StoreResult<Vec<Record>> {
        let collections = self.guard()?;
        Ok(collections
            .get(entity_type)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!(path = %self.path.display(), "Closed file store");
        Ok(())
    }

    fn destroy(&self) -> StoreResult<()> {
        lock(&self.collections)?.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
