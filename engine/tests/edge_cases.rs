//! Edge case tests for cactus-engine
//!
//! These tests cover boundary conditions and unusual inputs and responses.

use async_trait::async_trait;
use cactus_engine::{
    compare_timestamps, remote::mock::MemoryRemote, Error, FieldDef, FieldType, ModelConfig,
    ObjectType, OperationDescriptor, OperationKind, Record, Remote, Resolution, Schema, Session,
    SessionConfig, StoreSnapshot, SyncError,
};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

fn create_test_schema() -> Schema {
    Schema::new().with_object(ObjectType::new(
        "Item",
        vec![
            FieldDef::required("id", FieldType::Id),
            FieldDef::required("name", FieldType::String),
            FieldDef::optional("count", FieldType::Int),
            FieldDef::optional("data", FieldType::Json),
        ],
    ))
}

fn open(remote: Arc<dyn Remote>) -> Session {
    Session::init(SessionConfig::new(create_test_schema()), remote).unwrap()
}

/// A remote that answers every dispatch with a fixed response.
struct ScriptedRemote {
    response: Value,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedRemote {
    fn new(response: Value) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Remote for ScriptedRemote {
    async fn dispatch(&self, op: &OperationDescriptor, args: Value) -> Result<Value, SyncError> {
        self.calls.lock().unwrap().push((op.name.clone(), args));
        Ok(self.response.clone())
    }
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[tokio::test]
async fn empty_string_fields() {
    let session = open(Arc::new(MemoryRemote::new()));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    let outcome = items.add(json!({"id": "item1", "name": ""})).await.unwrap();
    assert!(outcome.is_confirmed());
    assert_eq!(items.get("item1").unwrap().unwrap().get("name"), Some(&json!("")));
}

#[tokio::test]
async fn unicode_strings() {
    let session = open(Arc::new(MemoryRemote::new()));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    let unicode_names = vec![
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Hello\nWorld\tTab",
        "Null\0Test",
    ];

    for (i, name) in unicode_names.iter().enumerate() {
        let id = format!("item_{}", i);
        let outcome = items.add(json!({"id": id, "name": name})).await;
        assert!(outcome.is_ok(), "Failed for: {}", name);
        assert_eq!(items.get(&id).unwrap().unwrap().get("name"), Some(&json!(name)));
    }
}

#[tokio::test]
async fn very_long_strings() {
    let session = open(Arc::new(MemoryRemote::new()));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    let long_name = "x".repeat(1_000_000);
    items
        .add(json!({"id": "long", "name": long_name}))
        .await
        .unwrap();

    let record = items.get("long").unwrap().unwrap();
    assert_eq!(record.get("name").and_then(Value::as_str).map(str::len), Some(1_000_000));
}

// ============================================================================
// Identity Edge Cases
// ============================================================================

#[tokio::test]
async fn numeric_ids_are_normalized() {
    let session = open(Arc::new(MemoryRemote::new()));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    items.add(json!({"id": 42, "name": "answer"})).await.unwrap();
    assert!(items.get("42").unwrap().is_some());

    let err = items.add(json!({"id": "42", "name": "again"})).await.unwrap_err();
    assert!(matches!(err, Error::Duplicate { .. }));
}

#[tokio::test]
async fn generated_ids_are_unique() {
    let session = open(Arc::new(MemoryRemote::new()));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    for i in 0..100 {
        items.add(json!({"name": format!("item {i}")})).await.unwrap();
    }

    let mut ids: Vec<_> = items.list().unwrap().into_iter().map(|r| r.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 100);
}

#[tokio::test]
async fn bad_identity_type() {
    let session = open(Arc::new(MemoryRemote::new()));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    let err = items
        .add(json!({"id": {"nested": true}, "name": "x"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[tokio::test]
async fn remote_assigned_identity_rekeys_local() {
    let remote = Arc::new(ScriptedRemote::new(json!({
        "createItem": {"id": "server-7", "name": "named"}
    })));
    let session = open(remote);
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    let outcome = items.add(json!({"id": "local-1", "name": "named"})).await.unwrap();
    assert_eq!(outcome.resolution(), Some(Resolution::Adopted));
    assert_eq!(outcome.record.id, "server-7");

    let ids: Vec<_> = items.list().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["server-7"]);
}

#[tokio::test]
async fn remote_assigned_identity_never_overwrites_another_record() {
    let remote = Arc::new(ScriptedRemote::new(json!({
        "createItem": {"id": "server-7", "name": "from-rekey"}
    })));
    let session = open(remote);
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    // server-7 exists locally and has moved on to version 3
    items.add(json!({"id": "server-7", "name": "precious"})).await.unwrap();
    items.update(json!({"id": "server-7", "name": "precious"})).await.unwrap();
    items.update(json!({"id": "server-7", "name": "precious"})).await.unwrap();

    let outcome = items.add(json!({"id": "local-1", "name": "new"})).await.unwrap();
    assert!(matches!(
        outcome.remote_error(),
        Some(SyncError::MalformedResponse { reason, .. }) if reason.contains("server-7")
    ));
    assert_eq!(outcome.record.id, "local-1");

    let kept = items.get("server-7").unwrap().unwrap();
    assert_eq!(kept.version, 3);
    assert_eq!(kept.get("name"), Some(&json!("precious")));
    assert_eq!(items.get("local-1").unwrap().unwrap().version, 1);
    assert!(items.pending().iter().any(|p| p.record_id == "local-1"));
}

// ============================================================================
// JSON Edge Cases
// ============================================================================

#[tokio::test]
async fn deeply_nested_json() {
    let session = open(Arc::new(MemoryRemote::new()));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    let mut nested = json!({"leaf": true});
    for _ in 0..50 {
        nested = json!({"child": nested});
    }

    items
        .add(json!({"id": "deep", "name": "deep", "data": nested.clone()}))
        .await
        .unwrap();
    assert_eq!(items.get("deep").unwrap().unwrap().get("data"), Some(&nested));
}

#[tokio::test]
async fn undeclared_fields_are_carried() {
    let remote = Arc::new(MemoryRemote::new());
    let session = open(remote.clone());
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    items
        .add(json!({"id": "x", "name": "x", "extra": [1, 2, 3]}))
        .await
        .unwrap();

    assert_eq!(items.get("x").unwrap().unwrap().get("extra"), Some(&json!([1, 2, 3])));
    assert_eq!(remote.get("Item", "x").unwrap()["extra"], json!([1, 2, 3]));
}

#[tokio::test]
async fn integer_boundaries() {
    let session = open(Arc::new(MemoryRemote::new()));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    for (i, count) in [i64::MIN, -1, 0, i64::MAX].iter().enumerate() {
        let id = format!("n{i}");
        items
            .add(json!({"id": id, "name": "n", "count": count}))
            .await
            .unwrap();
        assert_eq!(items.get(&id).unwrap().unwrap().get("count"), Some(&json!(count)));
    }

    let err = items
        .add(json!({"id": "f", "name": "n", "count": 1.5}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

// ============================================================================
// Response Edge Cases
// ============================================================================

#[tokio::test]
async fn null_create_payload_is_malformed() {
    let session = open(Arc::new(ScriptedRemote::new(json!({"createItem": null}))));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    let outcome = items.add(json!({"id": "a", "name": "a"})).await.unwrap();
    assert!(matches!(
        outcome.remote_error(),
        Some(SyncError::MalformedResponse { .. })
    ));
    assert_eq!(items.pending().len(), 1);
    assert_eq!(items.list().unwrap().len(), 1);
}

#[tokio::test]
async fn non_object_response_is_malformed() {
    let session = open(Arc::new(ScriptedRemote::new(json!("ok"))));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    let outcome = items.add(json!({"id": "a", "name": "a"})).await.unwrap();
    assert!(matches!(
        outcome.remote_error(),
        Some(SyncError::MalformedResponse { .. })
    ));
}

#[tokio::test]
async fn null_delete_payload_is_accepted() {
    let remote = Arc::new(ScriptedRemote::new(json!({
        "createItem": {"id": "a", "name": "a"},
        "deleteItem": null,
    })));
    let session = open(remote.clone());
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    items.add(json!({"id": "a", "name": "a"})).await.unwrap();
    let outcome = items.remove(json!({"id": "a"})).await.unwrap();
    assert!(outcome.is_confirmed());
    assert_eq!(outcome.response(), None);
    assert_eq!(outcome.resolution(), Some(Resolution::Deleted));

    let calls = remote.calls.lock().unwrap();
    assert_eq!(calls[1].0, "deleteItem");
    assert_eq!(calls[1].1, json!({"input": {"id": "a", "_version": 1}}));
}

#[tokio::test]
async fn partial_response_falls_back_to_dispatched_metadata() {
    // The remote echoes only the fields it cares about
    let remote = Arc::new(ScriptedRemote::new(json!({"createItem": {"name": "a"}})));
    let session = open(remote);
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    let outcome = items.add(json!({"id": "a", "name": "a"})).await.unwrap();
    assert_eq!(outcome.resolution(), Some(Resolution::Unchanged));
    assert_eq!(outcome.response().map(|r| r.version), Some(1));
}

#[tokio::test]
async fn custom_operation_names() {
    let remote = Arc::new(ScriptedRemote::new(json!({"insert_item": {"id": "a", "name": "a"}})));
    let session = open(remote.clone());
    let items = session
        .attach_model(ModelConfig::new("Item").with_operation(OperationKind::Create, "insert_item"))
        .unwrap();

    let outcome = items.add(json!({"id": "a", "name": "a"})).await.unwrap();
    assert!(outcome.is_confirmed());
    assert_eq!(remote.calls.lock().unwrap()[0].0, "insert_item");
    assert_eq!(items.entity().operation(OperationKind::Update).name, "updateItem");
}

// ============================================================================
// Timestamp Edge Cases
// ============================================================================

#[test]
fn mixed_timestamp_formats() {
    // Numeric strings of different lengths
    assert_eq!(compare_timestamps("999", "1000"), Ordering::Less);
    // RFC 3339 with offsets
    assert_eq!(
        compare_timestamps("2024-06-01T12:00:00Z", "2024-06-01T13:00:00+02:00"),
        Ordering::Greater
    );
    // Neither format: byte order
    assert_eq!(compare_timestamps("b", "a"), Ordering::Greater);
    assert_eq!(compare_timestamps("", ""), Ordering::Equal);
}

// ============================================================================
// Snapshot Edge Cases
// ============================================================================

#[test]
fn snapshot_empty_store() {
    let snapshot = StoreSnapshot::new();
    assert_eq!(snapshot.record_count(), 0);

    let json = snapshot.to_json().unwrap();
    let restored = StoreSnapshot::from_json(&json).unwrap();
    assert_eq!(restored.record_count(), 0);
}

#[test]
fn snapshot_rejects_duplicate_ids() {
    let mut snapshot = StoreSnapshot::new();
    snapshot.add_record("Item", Record::new("a", 1, "1", json!({})));
    snapshot.add_record("Item", Record::new("a", 2, "2", json!({})));

    assert!(snapshot.validate().is_err());
}

// ============================================================================
// Schema Edge Cases
// ============================================================================

#[test]
fn schema_with_many_types() {
    let mut schema = Schema::new();
    for i in 0..100 {
        schema.add_type(cactus_engine::TypeDef::Object(ObjectType::new(
            format!("Type{}", i),
            vec![FieldDef::required("id", FieldType::Id)],
        )));
    }

    let session = Session::init(SessionConfig::new(schema), Arc::new(MemoryRemote::new())).unwrap();
    for i in 0..100 {
        session
            .attach_model(ModelConfig::new(format!("Type{}", i)))
            .unwrap();
    }
    assert_eq!(session.attached().len(), 100);
}

#[test]
fn schema_from_json() {
    let schema = Schema::from_json(
        r#"{"types": {"Item": {"kind": "object", "name": "Item", "fields": [
            {"name": "id", "fieldType": "id", "required": true}
        ]}}}"#,
    )
    .unwrap();
    assert!(schema.get_type("Item").and_then(|t| t.as_object()).is_some());

    assert!(Schema::from_json("{not json").is_err());
}

// ============================================================================
// Many Records
// ============================================================================

#[tokio::test]
async fn many_pending_operations() {
    let remote = Arc::new(MemoryRemote::offline());
    let session = open(remote.clone());
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    for i in 0..200 {
        items
            .add(json!({"id": format!("item_{i}"), "name": "n"}))
            .await
            .unwrap();
    }
    assert_eq!(items.pending().len(), 200);

    remote.set_online(true);
    for i in 0..100 {
        items.retry(&format!("item_{i}")).await.unwrap();
    }
    assert_eq!(items.pending().len(), 100);
    assert_eq!(remote.count("Item"), 100);
}

#[tokio::test]
async fn list_keeps_insertion_order() {
    let session = open(Arc::new(MemoryRemote::new()));
    let items = session.attach_model(ModelConfig::new("Item")).unwrap();

    for name in ["c", "a", "b"] {
        items.add(json!({"id": name, "name": name})).await.unwrap();
    }
    items.update(json!({"id": "c", "name": "c2"})).await.unwrap();

    let ids: Vec<_> = items.list().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
}
