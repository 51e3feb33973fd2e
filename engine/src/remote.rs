//! Remote dispatch capability.
//!
//! The engine only needs "submit mutation, get structured success or failure
//! back". Encoding, authentication and network retries belong to the
//! implementation behind [`Remote`].

use crate::{error::SyncError, operation::OperationDescriptor};
use async_trait::async_trait;
use serde_json::Value;

/// A remote source of truth that accepts mutations.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Submit a mutation and wait for the response.
    ///
    /// Implementations must return (never hang) on timeout; the engine also
    /// bounds every call with the session's dispatch timeout.
    async fn dispatch(&self, op: &OperationDescriptor, args: Value) -> Result<Value, SyncError>;
}

/// An in-memory remote for tests and offline experiments.
pub mod mock {
    use super::*;
    use crate::operation::{OperationKind, INPUT_ARGUMENT};
    use crate::record::VERSION_FIELD;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// A remote holding records per entity type, keyed by `id`.
    ///
    /// Behaves like a simple mutation API:
    /// - create stores the input and echoes it
    /// - update stores the input unless the stored version is newer or equal,
    ///   in which case the stored record is returned (a concurrent writer won)
    /// - delete removes and returns the stored record
    #[derive(Debug, Default)]
    pub struct MemoryRemote {
        records: Mutex<HashMap<(String, String), Value>>,
        offline: AtomicBool,
        fail_next: AtomicU32,
        latency_ms: AtomicU32,
        dispatched: AtomicUsize,
        identity_field: Option<String>,
    }

    impl MemoryRemote {
        pub fn new() -> Self {
            Self::default()
        }

        /// A remote that fails every dispatch.
        pub fn offline() -> Self {
            let remote = Self::new();
            remote.set_online(false);
            remote
        }

        /// Key stored records by a field other than `id`.
        pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
            self.identity_field = Some(field.into());
            self
        }

        pub fn set_online(&self, online: bool) {
            self.offline.store(!online, Ordering::SeqCst);
        }

        /// Fail the next `count` dispatches.
        pub fn fail_next(&self, count: u32) {
            self.fail_next.store(count, Ordering::SeqCst);
        }

        /// Delay every dispatch.
        pub fn set_latency(&self, latency: Duration) {
            let millis = u32::try_from(latency.as_millis()).unwrap_or(u32::MAX);
            self.latency_ms.store(millis, Ordering::SeqCst);
        }

        /// Store a record as if another writer had created it.
        pub fn seed(&self, entity_type: &str, record: Value) {
            if let Some(id) = self.id_of(&record) {
                self.lock()
                    .insert((entity_type.to_string(), id), record);
            }
        }

        /// Stored record, if any.
        pub fn get(&self, entity_type: &str, id: &str) -> Option<Value> {
            self.lock()
                .get(&(entity_type.to_string(), id.to_string()))
                .cloned()
        }

        /// Number of stored records of a type.
        pub fn count(&self, entity_type: &str) -> usize {
            self.lock()
                .keys()
                .filter(|(t, _)| t == entity_type)
                .count()
        }

        /// Dispatches received so far, including failed ones.
        pub fn dispatched(&self) -> usize {
            self.dispatched.load(Ordering::SeqCst)
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Value>> {
            // A poisoned map only means a test panicked mid-dispatch.
            self.records
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        fn id_of(&self, record: &Value) -> Option<String> {
            let field = self.identity_field.as_deref().unwrap_or("id");
            match record.get(field)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        }

        fn respond(op: &OperationDescriptor, payload: Option<Value>) -> Value {
            let mut obj = serde_json::Map::new();
            obj.insert(op.name.clone(), payload.unwrap_or(Value::Null));
            Value::Object(obj)
        }

        fn rejected(op: &OperationDescriptor, reason: impl Into<String>) -> SyncError {
            SyncError::Rejected {
                operation: op.name.clone(),
                reason: reason.into(),
            }
        }
    }

    #[async_trait]
    impl Remote for MemoryRemote {
        async fn dispatch(
            &self,
            op: &OperationDescriptor,
            args: Value,
        ) -> Result<Value, SyncError> {
            self.dispatched.fetch_add(1, Ordering::SeqCst);

            let latency = self.latency_ms.load(Ordering::SeqCst);
            if latency > 0 {
                tokio::time::sleep(Duration::from_millis(u64::from(latency))).await;
            }
            if self.offline.load(Ordering::SeqCst) {
                return Err(SyncError::Unavailable("remote is offline".into()));
            }
            let should_fail = self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                return Err(SyncError::Unavailable("injected failure".into()));
            }

            let input = args
                .get(INPUT_ARGUMENT)
                .cloned()
                .ok_or_else(|| Self::rejected(op, "missing input argument"))?;
            let id = self
                .id_of(&input)
                .ok_or_else(|| Self::rejected(op, "input has no identity"))?;
            let key = (op.entity_type.clone(), id);

            let mut records = self.lock();
            let payload = match op.kind {
                OperationKind::Create => {
                    if records.contains_key(&key) {
                        return Err(Self::rejected(op, "record already exists"));
                    }
                    records.insert(key, input.clone());
                    Some(input)
                }
                OperationKind::Update => {
                    let stored = records
                        .get(&key)
                        .ok_or_else(|| Self::rejected(op, "record not found"))?;
                    let stored_version = stored.get(VERSION_FIELD).and_then(Value::as_u64);
                    let incoming_version = input.get(VERSION_FIELD).and_then(Value::as_u64);
                    match (stored_version, incoming_version) {
                        (Some(stored_v), Some(incoming_v)) if stored_v >= incoming_v => {
                            Some(stored.clone())
                        }
                        _ => {
                            let mut merged = stored.clone();
                            if let (Some(target), Some(source)) =
                                (merged.as_object_mut(), input.as_object())
                            {
                                for (k, v) in source {
                                    target.insert(k.clone(), v.clone());
                                }
                            }
                            records.insert(key, merged.clone());
                            Some(merged)
                        }
                    }
                }
                OperationKind::Delete => Some(
                    records
                        .remove(&key)
                        .ok_or_else(|| Self::rejected(op, "record not found"))?,
                ),
            };

            Ok(Self::respond(op, payload))
        }
    }

}
