//! Optimistic CRUD orchestration.
//!
//! A [`Model`] is the per-entity-type handle handed out by
//! [`crate::Session::attach_model`]. Every mutation runs in two phases:
//!
//! 1. Under the model's write gate: read existing, stamp, write locally,
//!    publish the settled list.
//! 2. Outside the gate: dispatch the remote mutation (bounded by the session
//!    timeout), then re-enter the gate to reconcile the response against
//!    whatever is local by then.
//!
//! Remote failures never unwind phase 1. They are reported in the
//! [`MutationOutcome`] and recorded in the pending ledger until the caller
//! retries.

use crate::{
    clock::VersionClock,
    error::Result,
    model::EntityModel,
    notify::{ChangeEvent, ChangeNotifier, LiveList, SubscriptionHandle},
    operation::{OperationKind, PendingOp},
    reconcile::{reconcile, Decision, Resolution},
    record::VERSION_FIELD,
    remote::Remote,
    store::LocalStore,
    Error, Record, RecordId, SyncError,
};
use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Result of a mutation: the local write always happened, the remote part
/// may not have.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome<T = Record> {
    /// Locally settled record; the removed snapshot for `remove`
    pub record: T,
    /// Remote confirmation, or why there is none
    pub remote: std::result::Result<RemoteAck<T>, SyncError>,
}

/// A remote response after reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAck<T = Record> {
    /// Decoded remote payload, absent when a delete answered `null`
    pub response: Option<T>,
    pub resolution: Resolution,
}

impl<T> MutationOutcome<T> {
    /// Whether the remote accepted the mutation.
    pub fn is_confirmed(&self) -> bool {
        self.remote.is_ok()
    }

    pub fn remote_error(&self) -> Option<&SyncError> {
        self.remote.as_ref().err()
    }

    /// Decoded remote payload, if any.
    pub fn response(&self) -> Option<&T> {
        self.remote.as_ref().ok().and_then(|ack| ack.response.as_ref())
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.remote.as_ref().ok().map(|ack| ack.resolution)
    }

    /// Convert both the local record and the remote payload.
    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(T) -> std::result::Result<U, E>,
    ) -> std::result::Result<MutationOutcome<U>, E> {
        let record = f(self.record)?;
        let remote = match self.remote {
            Ok(ack) => Ok(RemoteAck {
                response: ack.response.map(&mut f).transpose()?,
                resolution: ack.resolution,
            }),
            Err(e) => Err(e),
        };
        Ok(MutationOutcome { record, remote })
    }
}

/// State shared by a session and every model attached to it.
pub(crate) struct SessionCore {
    pub(crate) store: Arc<dyn LocalStore>,
    pub(crate) remote: Arc<dyn Remote>,
    pub(crate) notifier: Arc<ChangeNotifier>,
    pub(crate) clock: VersionClock,
    pub(crate) dispatch_timeout: Duration,
    pub(crate) closed: AtomicBool,
}

impl SessionCore {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

struct ModelInner {
    entity: EntityModel,
    core: Arc<SessionCore>,
    /// Serializes read-stamp-write for this entity type
    write_gate: Mutex<()>,
    pending: DashMap<RecordId, PendingOp>,
}

/// Handle to one attached entity type.
///
/// Cheap to clone; clones share the write gate and pending ledger.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    pub(crate) fn new(entity: EntityModel, core: Arc<SessionCore>) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                entity,
                core,
                write_gate: Mutex::new(()),
                pending: DashMap::new(),
            }),
        }
    }

    /// The entity model this handle is bound to.
    pub fn entity(&self) -> &EntityModel {
        &self.inner.entity
    }

    pub fn type_name(&self) -> &str {
        self.inner.entity.type_name()
    }

    /// Add a record optimistically, then create it remotely.
    ///
    /// A missing identity gets a fresh UUID. An identity already present
    /// locally is an [`Error::Duplicate`] and nothing is written.
    pub async fn add(&self, input: Value) -> Result<MutationOutcome> {
        self.core().ensure_open()?;
        let input = self.inner.entity.create_input(input)?;
        let store = self.store();
        let type_name = self.type_name();

        let record = {
            let _gate = self.inner.write_gate.lock().await;
            self.core().ensure_open()?;

            let id = match input.id {
                Some(id) => {
                    if store.get(type_name, &id)?.is_some() {
                        return Err(Error::Duplicate {
                            entity: type_name.to_string(),
                            id,
                        });
                    }
                    id
                }
                None => uuid::Uuid::new_v4().to_string(),
            };

            let mut stamp = self.core().clock.stamp(None)?;
            if let Some(at) = input.last_updated_at {
                stamp.last_updated_at = at;
            }
            let record = Record {
                id,
                version: stamp.version,
                last_updated_at: stamp.last_updated_at,
                fields: input.fields,
            };

            store.put(type_name, &record)?;
            tracing::debug!(
                entity = %type_name,
                id = %record.id,
                version = record.version,
                "Added record locally"
            );
            self.publish();
            record
        };

        self.sync(OperationKind::Create, record).await
    }

    /// Merge fields over an existing record, bump its version, then update
    /// it remotely.
    pub async fn update(&self, input: Value) -> Result<MutationOutcome> {
        self.core().ensure_open()?;
        let (id, input) = self.inner.entity.update_input(input)?;
        let store = self.store();
        let type_name = self.type_name();

        let record = {
            let _gate = self.inner.write_gate.lock().await;
            self.core().ensure_open()?;

            let mut record = store
                .get(type_name, &id)?
                .ok_or_else(|| self.not_found(&id))?;

            let mut stamp = self.core().clock.stamp(Some(&record))?;
            if let Some(requested) = input.version.filter(|v| *v != stamp.version) {
                tracing::debug!(
                    entity = %type_name,
                    id = %id,
                    requested,
                    version = stamp.version,
                    "Ignoring caller-supplied version"
                );
            }
            if let Some(at) = input.last_updated_at {
                stamp.last_updated_at = at;
            }
            record.merge_fields(input.fields);
            record.apply_stamp(stamp);

            store.put(type_name, &record)?;
            tracing::debug!(
                entity = %type_name,
                id = %record.id,
                version = record.version,
                "Updated record locally"
            );
            self.publish();
            record
        };

        self.sync(OperationKind::Update, record).await
    }

    /// Delete a record locally, then remotely.
    ///
    /// The outcome carries the removed snapshot and the remote's own copy of
    /// the deleted record when it sends one.
    pub async fn remove(&self, input: Value) -> Result<MutationOutcome> {
        self.core().ensure_open()?;
        let id = self.inner.entity.delete_input(input)?;
        let store = self.store();
        let type_name = self.type_name();

        let removed = {
            let _gate = self.inner.write_gate.lock().await;
            self.core().ensure_open()?;

            let removed = store
                .get(type_name, &id)?
                .ok_or_else(|| self.not_found(&id))?;
            store.delete(type_name, &id)?;
            tracing::debug!(
                entity = %type_name,
                id = %id,
                version = removed.version,
                "Removed record locally"
            );
            self.publish();
            removed
        };

        self.sync(OperationKind::Delete, removed).await
    }

    /// All local records of this type, in insertion order.
    pub fn list(&self) -> Result<Vec<Record>> {
        self.core().ensure_open()?;
        Ok(self.store().list_all(self.type_name())?)
    }

    /// One local record.
    pub fn get(&self, id: &str) -> Result<Option<Record>> {
        self.core().ensure_open()?;
        Ok(self.store().get(self.type_name(), id)?)
    }

    /// Register a change handler for this entity type.
    pub fn subscribe(
        &self,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle> {
        self.core().ensure_open()?;
        Ok(self.core().notifier.subscribe(self.type_name(), handler))
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.core().notifier.unsubscribe(handle)
    }

    /// A list projection seeded from the store and refreshed on every change.
    pub fn live_list(&self) -> Result<LiveList> {
        let initial = self.list()?;
        Ok(LiveList::new(
            Arc::clone(&self.core().notifier),
            self.type_name(),
            initial,
        ))
    }

    /// Records whose last remote dispatch failed, oldest first.
    pub fn pending(&self) -> Vec<PendingOp> {
        let mut pending: Vec<PendingOp> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by(|a, b| {
            crate::compare_timestamps(&a.queued_at, &b.queued_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        pending
    }

    /// Re-dispatch the pending operation for a record.
    ///
    /// Creates and updates send the current local record; deletes send the
    /// removed snapshot. Fails with [`Error::NothingPending`] when the record
    /// has no failed dispatch on file.
    pub async fn retry(&self, id: &str) -> Result<MutationOutcome> {
        self.core().ensure_open()?;
        let pending = self
            .inner
            .pending
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NothingPending {
                entity: self.type_name().to_string(),
                id: id.to_string(),
            })?;

        let record = match pending.kind {
            OperationKind::Delete => pending.record,
            OperationKind::Create | OperationKind::Update => self
                .store()
                .get(self.type_name(), id)?
                .ok_or_else(|| self.not_found(id))?,
        };

        tracing::info!(
            entity = %self.type_name(),
            id = %id,
            op = %pending.kind,
            attempts = pending.attempts,
            "Retrying pending remote operation"
        );

        self.sync(pending.kind, record).await
    }

    fn core(&self) -> &SessionCore {
        &self.inner.core
    }

    fn store(&self) -> &dyn LocalStore {
        self.inner.core.store.as_ref()
    }

    fn not_found(&self, id: &str) -> Error {
        Error::NotFound {
            entity: self.type_name().to_string(),
            id: id.to_string(),
        }
    }

    /// Push the settled list to subscribers.
    ///
    /// Only called after a write has landed, so a failed read is logged and
    /// the mutation carries on.
    fn publish(&self) {
        match self.store().list_all(self.type_name()) {
            Ok(records) => {
                self.core().notifier.publish(self.type_name(), records);
            }
            Err(error) => {
                tracing::warn!(
                    entity = %self.type_name(),
                    error = %error,
                    "Skipping change notification; listing failed"
                );
            }
        }
    }

    /// Dispatch arguments for a mutation.
    fn args(&self, kind: OperationKind, record: &Record) -> Value {
        let identity = self.inner.entity.identity_field();
        let input = match kind {
            OperationKind::Delete => {
                let mut obj = Map::new();
                obj.insert(identity.to_string(), Value::String(record.id.clone()));
                obj.insert(VERSION_FIELD.to_string(), Value::from(record.version));
                Value::Object(obj)
            }
            OperationKind::Create | OperationKind::Update => record.to_value(identity),
        };
        self.inner.entity.operation(kind).args(input)
    }

    /// Remote dispatch bounded by the session timeout.
    async fn dispatch(
        &self,
        kind: OperationKind,
        record: &Record,
    ) -> std::result::Result<Value, SyncError> {
        let op = self.inner.entity.operation(kind);
        let timeout = self.core().dispatch_timeout;
        let args = self.args(kind, record);

        match tokio::time::timeout(timeout, self.core().remote.dispatch(op, args)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Dispatch, decode and reconcile.
    ///
    /// Everything after the dispatch, ledger included, runs under the write
    /// gate so responses for one record settle one at a time.
    async fn sync(&self, kind: OperationKind, sent: Record) -> Result<MutationOutcome> {
        let response = self.dispatch(kind, &sent).await;
        self.core().ensure_open()?;

        let decoded = response.and_then(|response| self.decode(kind, &response, &sent));
        let payload = match decoded {
            Ok(payload) => payload,
            Err(error) => {
                let _gate = self.inner.write_gate.lock().await;
                self.core().ensure_open()?;
                return self.defer(kind, sent, error);
            }
        };

        match (kind, payload) {
            (OperationKind::Create | OperationKind::Update, Some(incoming)) => {
                self.settle(kind, sent, incoming).await
            }
            // decode() guarantees a payload for creates and updates
            (_, payload) => {
                let _gate = self.inner.write_gate.lock().await;
                self.core().ensure_open()?;
                self.clear_pending(&sent);
                tracing::debug!(
                    entity = %self.type_name(),
                    id = %sent.id,
                    "Remote confirmed deletion"
                );
                Ok(MutationOutcome {
                    record: sent,
                    remote: Ok(RemoteAck {
                        response: payload,
                        resolution: Resolution::Deleted,
                    }),
                })
            }
        }
    }

    /// Report a failed dispatch and file it in the ledger. Caller holds the
    /// write gate.
    fn defer(
        &self,
        kind: OperationKind,
        sent: Record,
        error: SyncError,
    ) -> Result<MutationOutcome> {
        tracing::warn!(
            entity = %self.type_name(),
            id = %sent.id,
            op = %kind,
            error = %error,
            "Remote dispatch failed; keeping local state"
        );
        self.mark_pending(kind, &sent, &error)?;
        Ok(MutationOutcome {
            record: sent,
            remote: Err(error),
        })
    }

    /// Pull the record out of a response. Creates and updates must carry one.
    fn decode(
        &self,
        kind: OperationKind,
        response: &Value,
        sent: &Record,
    ) -> std::result::Result<Option<Record>, SyncError> {
        let op = self.inner.entity.operation(kind);
        let payload = op.extract(response)?;
        let Some(payload) = payload else {
            return match kind {
                OperationKind::Delete => Ok(None),
                _ => Err(op.malformed("response carries no record")),
            };
        };
        Record::from_value(payload, self.inner.entity.identity_field(), sent)
            .map(Some)
            .map_err(|e| op.malformed(e.to_string()))
    }

    /// Reconcile a create/update response against current local state.
    async fn settle(
        &self,
        kind: OperationKind,
        sent: Record,
        incoming: Record,
    ) -> Result<MutationOutcome> {
        let store = self.store();
        let type_name = self.type_name();

        let _gate = self.inner.write_gate.lock().await;
        self.core().ensure_open()?;

        // The remote may assign its own identity on create, but never one
        // another local record already holds.
        let rekeyed = kind == OperationKind::Create && incoming.id != sent.id;
        if rekeyed && store.get(type_name, &incoming.id)?.is_some() {
            let error = self.inner.entity.operation(kind).malformed(format!(
                "assigned identity '{}' is held by another local record",
                incoming.id
            ));
            return self.defer(kind, sent, error);
        }

        let local = store.get(type_name, &sent.id)?;
        let mut probe = incoming.clone();
        probe.id = sent.id.clone();

        let Decision {
            mut resolution,
            record,
        } = reconcile(local.as_ref(), &sent, probe);

        let replacement = match (record, local.as_ref()) {
            (Some(record), _) => Some(record),
            (None, Some(local)) if rekeyed => Some(local.clone()),
            _ => None,
        };

        let settled = match replacement {
            Some(mut record) if resolution.writes_local() || rekeyed => {
                if rekeyed {
                    record.id = incoming.id.clone();
                    store.rekey(type_name, &sent.id, &record)?;
                    if resolution == Resolution::Unchanged {
                        resolution = Resolution::Adopted;
                    }
                } else {
                    store.put(type_name, &record)?;
                }
                self.publish();
                record
            }
            _ => local.unwrap_or_else(|| sent.clone()),
        };
        self.clear_pending(&sent);

        match resolution {
            Resolution::Discarded => {
                tracing::warn!(
                    entity = %type_name,
                    id = %sent.id,
                    remote_version = incoming.version,
                    local_version = settled.version,
                    "Discarded stale remote response"
                );
            }
            Resolution::RemoteWins => {
                tracing::debug!(
                    entity = %type_name,
                    id = %settled.id,
                    version = settled.version,
                    "Remote version won conflict"
                );
            }
            _ => {
                tracing::debug!(
                    entity = %type_name,
                    id = %settled.id,
                    version = settled.version,
                    ?resolution,
                    "Reconciled remote response"
                );
            }
        }

        Ok(MutationOutcome {
            record: settled,
            remote: Ok(RemoteAck {
                response: Some(incoming),
                resolution,
            }),
        })
    }

    /// File a failed dispatch, unless a newer write or failure for the same
    /// record already supersedes it. Caller holds the write gate.
    fn mark_pending(&self, kind: OperationKind, record: &Record, error: &SyncError) -> Result<()> {
        let stamp = record.stamp();
        if kind != OperationKind::Delete {
            let superseded = self
                .store()
                .get(self.type_name(), &record.id)?
                .is_some_and(|local| local.stamp() > stamp);
            if superseded {
                tracing::debug!(
                    entity = %self.type_name(),
                    id = %record.id,
                    version = record.version,
                    "Not filing superseded dispatch"
                );
                return Ok(());
            }
        }

        match self.inner.pending.entry(record.id.clone()) {
            Entry::Occupied(mut entry) => {
                let on_file = entry.get();
                if on_file.kind != OperationKind::Delete && on_file.record.stamp() > stamp {
                    return Ok(());
                }
                entry
                    .get_mut()
                    .record_failure(kind, record.clone(), error.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingOp::new(
                    kind,
                    record.clone(),
                    self.core().clock.now(),
                    error.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Drop the ledger entry a confirmed dispatch covers. Entries for newer
    /// writes stay.
    fn clear_pending(&self, sent: &Record) {
        let stamp = sent.stamp();
        self.inner
            .pending
            .remove_if(&sent.id, |_, pending| pending.record.stamp() <= stamp);
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("entity", &self.type_name())
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StoreResult, operation::OperationDescriptor, remote::mock::MemoryRemote, FieldDef,
        FieldType, ManualTime, MemoryStore, ModelConfig, ObjectType, StoreError,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Memory store that can be told to fail listings or writes to one id.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        fail_lists: AtomicBool,
        fail_puts_for: StdMutex<Option<String>>,
    }

    impl FaultyStore {
        fn injected() -> StoreError {
            StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
    }

    impl LocalStore for FaultyStore {
        fn get(&self, entity_type: &str, id: &str) -> StoreResult<Option<Record>> {
            self.inner.get(entity_type, id)
        }

        fn put(&self, entity_type: &str, record: &Record) -> StoreResult<()> {
            if self.fail_puts_for.lock().unwrap().as_deref() == Some(record.id.as_str()) {
                return Err(Self::injected());
            }
            self.inner.put(entity_type, record)
        }

        fn delete(&self, entity_type: &str, id: &str) -> StoreResult<()> {
            self.inner.delete(entity_type, id)
        }

        fn list_all(&self, entity_type: &str) -> StoreResult<Vec<Record>> {
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            self.inner.list_all(entity_type)
        }

        fn close(&self) -> StoreResult<()> {
            self.inner.close()
        }

        fn destroy(&self) -> StoreResult<()> {
            self.inner.destroy()
        }
    }

    /// Answers every dispatch with the same response.
    struct Canned(Value);

    #[async_trait]
    impl Remote for Canned {
        async fn dispatch(
            &self,
            _op: &OperationDescriptor,
            _args: Value,
        ) -> std::result::Result<Value, SyncError> {
            Ok(self.0.clone())
        }
    }

    fn todo_model(remote: Arc<MemoryRemote>) -> Model {
        todo_model_with(Arc::new(MemoryStore::new()), remote)
    }

    fn todo_model_with(store: Arc<dyn LocalStore>, remote: Arc<dyn Remote>) -> Model {
        let object = ObjectType::new(
            "Todo",
            vec![
                FieldDef::required("id", FieldType::Id),
                FieldDef::required("title", FieldType::String),
                FieldDef::optional("done", FieldType::Bool),
            ],
        );
        let entity = EntityModel::new(object, &ModelConfig::new("Todo")).unwrap();
        let core = SessionCore {
            store,
            remote,
            notifier: Arc::new(ChangeNotifier::new()),
            clock: VersionClock::new(ManualTime::new(1_000)),
            dispatch_timeout: Duration::from_secs(5),
            closed: AtomicBool::new(false),
        };
        Model::new(entity, Arc::new(core))
    }

    #[tokio::test]
    async fn add_stamps_first_version() {
        let model = todo_model(Arc::new(MemoryRemote::new()));
        let outcome = model.add(json!({"title": "Hello"})).await.unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.record.version, 1);
        assert_eq!(outcome.record.last_updated_at, "1000");
        assert_eq!(outcome.resolution(), Some(Resolution::Unchanged));
        assert_eq!(model.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_duplicate_id() {
        let model = todo_model(Arc::new(MemoryRemote::new()));
        model.add(json!({"id": "t-1", "title": "a"})).await.unwrap();

        let err = model.add(json!({"id": "t-1", "title": "b"})).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
        assert_eq!(model.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_missing_record() {
        let model = todo_model(Arc::new(MemoryRemote::new()));
        let err = model
            .update(json!({"id": "nope", "title": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_args_carry_identity_and_version() {
        let model = todo_model(Arc::new(MemoryRemote::new()));
        let record = Record::new("t-1", 3, "1", json!({"title": "a"}));
        let args = model.args(OperationKind::Delete, &record);
        assert_eq!(args, json!({"input": {"id": "t-1", "_version": 3}}));
    }

    #[tokio::test]
    async fn failed_dispatch_lands_in_ledger() {
        let remote = Arc::new(MemoryRemote::offline());
        let model = todo_model(Arc::clone(&remote));

        let outcome = model.add(json!({"id": "t-1", "title": "a"})).await.unwrap();
        assert!(!outcome.is_confirmed());
        assert_eq!(model.pending().len(), 1);

        remote.set_online(true);
        let retried = model.retry("t-1").await.unwrap();
        assert!(retried.is_confirmed());
        assert!(model.pending().is_empty());
        assert_eq!(remote.count("Todo"), 1);
    }

    #[tokio::test]
    async fn listing_failure_after_write_still_dispatches() {
        let store = Arc::new(FaultyStore::default());
        store.fail_lists.store(true, Ordering::SeqCst);
        let remote = Arc::new(MemoryRemote::new());
        let model = todo_model_with(store.clone(), remote.clone());

        let outcome = model.add(json!({"id": "t-1", "title": "a"})).await.unwrap();
        assert!(outcome.is_confirmed());
        assert_eq!(remote.count("Todo"), 1);
        assert!(model.pending().is_empty());
        assert_eq!(model.get("t-1").unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn failed_rekey_keeps_local_record() {
        let store = Arc::new(FaultyStore::default());
        *store.fail_puts_for.lock().unwrap() = Some("server-7".into());
        let remote = Arc::new(Canned(json!({"createTodo": {"id": "server-7", "title": "a"}})));
        let model = todo_model_with(store, remote);

        let err = model.add(json!({"id": "t-1", "title": "a"})).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Io(_))));

        let record = model.get("t-1").unwrap().unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.get("title"), Some(&json!("a")));
        assert!(model.get("server-7").unwrap().is_none());
    }

    #[tokio::test]
    async fn retry_without_pending() {
        let model = todo_model(Arc::new(MemoryRemote::new()));
        let err = model.retry("t-1").await.unwrap_err();
        assert!(matches!(err, Error::NothingPending { .. }));
    }

    #[test]
    fn outcome_try_map() {
        let record = Record::new("t-1", 1, "1", json!({}));
        let outcome = MutationOutcome {
            record: record.clone(),
            remote: Ok(RemoteAck {
                response: Some(record),
                resolution: Resolution::Unchanged,
            }),
        };
        let mapped: MutationOutcome<String> = outcome
            .try_map(|r| Ok::<_, ()>(r.id))
            .unwrap();
        assert_eq!(mapped.record, "t-1");
        assert_eq!(mapped.response().map(String::as_str), Some("t-1"));
    }
}
