//! Compile-time typed models.
//!
//! An [`Entity`] fixes the shapes of a type's records and of its create,
//! update and delete inputs. [`TypedModel`] converts at the edges and
//! delegates everything else to the untyped [`Model`].

use crate::{
    engine::{Model, MutationOutcome},
    error::Result,
    model::ModelConfig,
    notify::LiveList,
    operation::PendingOp,
    Record,
};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

/// A record type with fixed operation shapes.
///
/// The record struct deserializes from the flat wire shape, so it may
/// declare `_version` and `_lastUpdatedAt` fields to read the metadata.
pub trait Entity: DeserializeOwned + Send + Sync + 'static {
    /// Schema object type name
    const TYPE_NAME: &'static str;

    type CreateInput: Serialize + Send + Sync;
    type UpdateInput: Serialize + Send + Sync;
    type DeleteInput: Serialize + Send + Sync;

    /// Binding used by [`crate::Session::attach`]. Override to rename the
    /// identity field or remote operations.
    fn model_config() -> ModelConfig {
        ModelConfig::new(Self::TYPE_NAME)
    }
}

/// Typed handle over an attached [`Model`].
pub struct TypedModel<E: Entity> {
    model: Model,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for TypedModel<E> {
    fn clone(&self) -> Self {
        Self::new(self.model.clone())
    }
}

impl<E: Entity> TypedModel<E> {
    pub(crate) fn new(model: Model) -> Self {
        Self {
            model,
            _entity: PhantomData,
        }
    }

    /// The untyped handle.
    pub fn untyped(&self) -> &Model {
        &self.model
    }

    pub async fn add(&self, input: &E::CreateInput) -> Result<MutationOutcome<E>> {
        let outcome = self.model.add(serde_json::to_value(input)?).await?;
        self.decode_outcome(outcome)
    }

    pub async fn update(&self, input: &E::UpdateInput) -> Result<MutationOutcome<E>> {
        let outcome = self.model.update(serde_json::to_value(input)?).await?;
        self.decode_outcome(outcome)
    }

    pub async fn remove(&self, input: &E::DeleteInput) -> Result<MutationOutcome<E>> {
        let outcome = self.model.remove(serde_json::to_value(input)?).await?;
        self.decode_outcome(outcome)
    }

    pub async fn retry(&self, id: &str) -> Result<MutationOutcome<E>> {
        let outcome = self.model.retry(id).await?;
        self.decode_outcome(outcome)
    }

    pub fn list(&self) -> Result<Vec<E>> {
        self.model
            .list()?
            .into_iter()
            .map(|record| self.decode(record))
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<E>> {
        self.model
            .get(id)?
            .map(|record| self.decode(record))
            .transpose()
    }

    pub fn pending(&self) -> Vec<PendingOp> {
        self.model.pending()
    }

    /// Untyped live projection; decode entries with [`TypedModel::decode`].
    pub fn live_list(&self) -> Result<LiveList> {
        self.model.live_list()
    }

    /// Decode a record into the entity type.
    pub fn decode(&self, record: Record) -> Result<E> {
        let value = record.to_value(self.model.entity().identity_field());
        Ok(serde_json::from_value(value)?)
    }

    fn decode_outcome(&self, outcome: MutationOutcome) -> Result<MutationOutcome<E>> {
        outcome.try_map(|record| self.decode(record))
    }
}

impl<E: Entity> std::fmt::Debug for TypedModel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedModel")
            .field("entity", &E::TYPE_NAME)
            .finish()
    }
}
