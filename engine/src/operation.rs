//! Remote operation descriptors.
//!
//! Each entity model exposes one descriptor per remote mutation. The engine
//! treats them as opaque beyond building arguments and pulling the record
//! payload out of a response.

use crate::{error::SyncError, EntityType, Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument key wrapping the record in every dispatch.
pub const INPUT_ARGUMENT: &str = "input";

/// Kind of remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A remote mutation bound to one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    /// Mutation kind
    pub kind: OperationKind,
    /// Entity type the mutation targets
    pub entity_type: EntityType,
    /// Remote operation name, also the response payload key
    pub name: String,
}

impl OperationDescriptor {
    /// Create a descriptor with an explicit remote name.
    pub fn new(
        kind: OperationKind,
        entity_type: impl Into<EntityType>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity_type: entity_type.into(),
            name: name.into(),
        }
    }

    /// Descriptor named by convention, e.g. `createTodo`.
    pub fn conventional(kind: OperationKind, entity_type: &str) -> Self {
        Self::new(kind, entity_type, format!("{kind}{entity_type}"))
    }

    /// Wrap a record object into dispatch arguments.
    pub fn args(&self, input: Value) -> Value {
        let mut args = Map::new();
        args.insert(INPUT_ARGUMENT.to_string(), input);
        Value::Object(args)
    }

    /// Pull the record payload out of a response.
    ///
    /// Returns `Ok(None)` when the payload is `null` or absent. Responses that
    /// are not objects are malformed.
    pub fn extract<'a>(&self, response: &'a Value) -> Result<Option<&'a Value>, SyncError> {
        let obj = response
            .as_object()
            .ok_or_else(|| self.malformed("response is not an object"))?;
        match obj.get(&self.name) {
            None | Some(Value::Null) => Ok(None),
            Some(payload) if payload.is_object() => Ok(Some(payload)),
            Some(_) => Err(self.malformed("payload is not an object")),
        }
    }

    /// Build a malformed-response error for this operation.
    pub fn malformed(&self, reason: impl Into<String>) -> SyncError {
        SyncError::MalformedResponse {
            operation: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// A remote mutation that failed and awaits a caller-initiated retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOp {
    /// Record the mutation targets
    pub record_id: RecordId,
    /// What has to be replayed
    pub kind: OperationKind,
    /// Record as last dispatched; the removed snapshot for deletes
    pub record: Record,
    /// When the first failed dispatch happened
    pub queued_at: String,
    /// Most recent failure
    pub last_error: SyncError,
    /// Failed dispatches so far
    pub attempts: u32,
}

impl PendingOp {
    pub fn new(
        kind: OperationKind,
        record: Record,
        queued_at: impl Into<String>,
        error: SyncError,
    ) -> Self {
        Self {
            record_id: record.id.clone(),
            kind,
            record,
            queued_at: queued_at.into(),
            last_error: error,
            attempts: 1,
        }
    }

    /// Fold another failure into this entry.
    ///
    /// A record never confirmed remotely stays a create until a delete
    /// replaces it.
    pub fn record_failure(&mut self, kind: OperationKind, record: Record, error: SyncError) {
        self.kind = match (self.kind, kind) {
            (_, OperationKind::Delete) => OperationKind::Delete,
            (OperationKind::Create, _) => OperationKind::Create,
            (_, kind) => kind,
        };
        self.record = record;
        self.last_error = error;
        self.attempts += 1;
    }
}
