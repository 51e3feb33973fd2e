//! # Cactus Engine
//!
//! An optimistic, offline-first synchronization engine.
//!
//! Records are written to a local store before the remote source of truth
//! confirms them. Every record carries version metadata so concurrent edits,
//! local against remote or between local callers, can be detected and
//! reconciled without corrupting state.
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is a flat entity with:
//! - A stable identity (assigned locally when the caller supplies none)
//! - Arbitrary domain fields (JSON)
//! - `_version`, starting at 1 and incremented on every accepted update
//! - `_lastUpdatedAt`, a string timestamp set by the mutator
//!
//! ### Version Clock
//!
//! The [`VersionClock`] stamps records and decides staleness. The record with
//! the higher version wins; on equal versions the later `_lastUpdatedAt` wins.
//!
//! ### Entity Models
//!
//! An [`EntityModel`] binds a schema object type to its identity field and its
//! remote create/update/delete operations. Attaching one to a [`Session`]
//! yields a [`Model`] handle with `add`, `update`, `remove` and `list`.
//!
//! ### Reconciliation
//!
//! After a remote response arrives, [`reconcile::reconcile`] decides whether
//! the remote value replaces local state. Remote failures never roll back the
//! optimistic local write; they are reported in the [`MutationOutcome`].
//!
//! ## Quick Start
//!
//! ```rust
//! use cactus_engine::{
//!     remote::mock::MemoryRemote, FieldDef, FieldType, ModelConfig, ObjectType, Schema,
//!     Session, SessionConfig,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! // 1. Describe the schema
//! let schema = Schema::new().with_object(ObjectType::new(
//!     "Todo",
//!     vec![
//!         FieldDef::required("id", FieldType::Id),
//!         FieldDef::required("title", FieldType::String),
//!     ],
//! ));
//!
//! // 2. Open a session against a remote
//! let remote = Arc::new(MemoryRemote::new());
//! let session = Session::init(SessionConfig::new(schema), remote).unwrap();
//!
//! // 3. Attach a model and mutate optimistically
//! let todos = session.attach_model(ModelConfig::new("Todo")).unwrap();
//! let outcome = todos.add(json!({"title": "Hello World!"})).await.unwrap();
//! assert!(outcome.is_confirmed());
//!
//! // 4. Read the local projection
//! let list = todos.list().unwrap();
//! assert_eq!(list.len(), 1);
//! assert_eq!(list[0].version, 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```
//!
//! ## Persistence
//!
//! The [`LocalStore`] trait is the storage capability. [`MemoryStore`] keeps
//! records in memory; [`FileStore`] persists a [`StoreSnapshot`] after every
//! write. Any other backend can be passed through [`StorageConfig::Custom`].

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod operation;
pub mod reconcile;
pub mod record;
pub mod remote;
pub mod schema;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod typed;

// Re-export main types at crate root
pub use clock::{compare_timestamps, ManualTime, Stamp, SystemTime, TimeSource, VersionClock};
pub use config::{ConfigError, SessionConfig, StorageConfig};
pub use engine::{Model, MutationOutcome, RemoteAck};
pub use error::{Error, StoreError, SyncError};
pub use model::{EntityModel, ModelConfig};
pub use notify::{ChangeEvent, ChangeNotifier, LiveList, SubscriptionHandle};
pub use operation::{OperationDescriptor, OperationKind, PendingOp};
pub use reconcile::Resolution;
pub use record::Record;
pub use remote::Remote;
pub use schema::{FieldDef, FieldType, ObjectType, Schema, TypeDef};
pub use session::Session;
pub use snapshot::{StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{Collection, FileStore, LocalStore, MemoryStore};
pub use typed::{Entity, TypedModel};

/// Type aliases for clarity
pub type RecordId = String;
pub type EntityType = String;
pub type Version = u64;
