//! Session lifecycle.
//!
//! A [`Session`] owns the local store handle and every attached model.
//! Models share the store, the notifier and the clock through one
//! `SessionCore`; tearing the session down closes all of them at once.

use crate::{
    clock::VersionClock,
    config::{SessionConfig, StorageConfig},
    engine::{Model, SessionCore},
    error::Result,
    model::{EntityModel, ModelConfig},
    notify::ChangeNotifier,
    remote::Remote,
    store::{FileStore, LocalStore, MemoryStore},
    typed::{Entity, TypedModel},
    EntityType, Error, Schema,
};
use dashmap::DashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A running synchronization session.
pub struct Session {
    schema: Schema,
    core: Arc<SessionCore>,
    models: DashMap<EntityType, Model>,
}

impl Session {
    /// Open the configured store and start a session against `remote`.
    pub fn init(config: SessionConfig, remote: Arc<dyn Remote>) -> Result<Self> {
        let store: Arc<dyn LocalStore> = match config.storage {
            StorageConfig::Memory => Arc::new(MemoryStore::new()),
            StorageConfig::File { path } => Arc::new(FileStore::open(path)?),
            StorageConfig::Custom(store) => store,
        };

        let dispatch_timeout_ms =
            u64::try_from(config.dispatch_timeout.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            types = config.schema.types.len(),
            dispatch_timeout_ms,
            "Session initialized"
        );

        Ok(Self {
            schema: config.schema,
            core: Arc::new(SessionCore {
                store,
                remote,
                notifier: Arc::new(ChangeNotifier::new()),
                clock: VersionClock::shared(config.time),
                dispatch_timeout: config.dispatch_timeout,
                closed: Default::default(),
            }),
            models: DashMap::new(),
        })
    }

    /// Bind an entity type and return its handle.
    ///
    /// Fails with [`Error::Configuration`] when the type cannot be bound or
    /// is already attached.
    pub fn attach_model(&self, config: ModelConfig) -> Result<Model> {
        self.core.ensure_open()?;
        let entity = EntityModel::from_schema(&self.schema, &config)?;

        match self.models.entry(config.type_name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::Configuration(format!(
                "type '{}' is already attached",
                config.type_name
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let model = Model::new(entity, Arc::clone(&self.core));
                slot.insert(model.clone());
                tracing::info!(
                    entity = %config.type_name,
                    identity = %config.identity_field,
                    "Model attached"
                );
                Ok(model)
            }
        }
    }

    /// Attach a typed entity.
    pub fn attach<E: Entity>(&self) -> Result<TypedModel<E>> {
        self.attach_model(E::model_config())
            .map(TypedModel::new)
    }

    /// Look up an attached model by type name.
    pub fn model(&self, type_name: &str) -> Option<Model> {
        self.models.get(type_name).map(|m| m.value().clone())
    }

    /// Names of attached entity types.
    pub fn attached(&self) -> Vec<EntityType> {
        let mut names: Vec<_> = self.models.iter().map(|m| m.key().clone()).collect();
        names.sort();
        names
    }

    /// Shared change notifier, for observers spanning several types.
    pub fn notifier(&self) -> Arc<ChangeNotifier> {
        Arc::clone(&self.core.notifier)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::SeqCst)
    }

    /// Release the store handle. Idempotent.
    ///
    /// Every later operation on the session or its models fails with
    /// [`Error::Closed`]; in-flight dispatches finish but do not reconcile.
    pub fn teardown(&self) -> Result<()> {
        if self.core.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.core.notifier.clear();
        self.core.store.close()?;
        tracing::info!(models = self.models.len(), "Session torn down");
        Ok(())
    }

    /// Tear down and drop all stored data.
    pub fn purge(self) -> Result<()> {
        self.teardown()?;
        self.core.store.destroy()?;
        tracing::info!("Session storage destroyed");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(error = %e, "Session teardown on drop failed");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("models", &self.attached())
            .field("closed", &self.is_closed())
            .finish()
    }
}
