//! Entity model descriptors.
//!
//! An [`EntityModel`] binds one schema object type to its identity field and
//! its three remote operations. It is validated once, at construction, and is
//! immutable afterwards.

use crate::{
    error::Result,
    operation::{OperationDescriptor, OperationKind},
    record::{RecordInput, STORAGE_ID_FIELD},
    EntityType, Error, ObjectType, Schema,
};
use serde::{Deserialize, Serialize};

/// Default identity field name.
pub const DEFAULT_IDENTITY_FIELD: &str = "id";

/// How to bind an entity type when attaching it to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Schema object type name
    pub type_name: EntityType,
    /// Identity field, `id` unless overridden
    pub identity_field: String,
    /// Remote create operation name, `create<Type>` unless overridden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_operation: Option<String>,
    /// Remote update operation name, `update<Type>` unless overridden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_operation: Option<String>,
    /// Remote delete operation name, `delete<Type>` unless overridden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_operation: Option<String>,
}

impl ModelConfig {
    pub fn new(type_name: impl Into<EntityType>) -> Self {
        Self {
            type_name: type_name.into(),
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            create_operation: None,
            update_operation: None,
            delete_operation: None,
        }
    }

    pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    /// Override a remote operation name.
    pub fn with_operation(mut self, kind: OperationKind, name: impl Into<String>) -> Self {
        let name = Some(name.into());
        match kind {
            OperationKind::Create => self.create_operation = name,
            OperationKind::Update => self.update_operation = name,
            OperationKind::Delete => self.delete_operation = name,
        }
        self
    }

    fn operation(&self, kind: OperationKind) -> OperationDescriptor {
        let name = match kind {
            OperationKind::Create => &self.create_operation,
            OperationKind::Update => &self.update_operation,
            OperationKind::Delete => &self.delete_operation,
        };
        match name {
            Some(name) => OperationDescriptor::new(kind, self.type_name.clone(), name.clone()),
            None => OperationDescriptor::conventional(kind, &self.type_name),
        }
    }
}

/// The remote surface of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityModel {
    object: ObjectType,
    identity_field: String,
    create: OperationDescriptor,
    update: OperationDescriptor,
    delete: OperationDescriptor,
}

impl EntityModel {
    /// Bind a model against the schema.
    ///
    /// Fails with [`Error::Configuration`] when the type is missing, is not an
    /// object type, or does not declare the identity field.
    pub fn from_schema(schema: &Schema, config: &ModelConfig) -> Result<Self> {
        let def = schema.get_type(&config.type_name).ok_or_else(|| {
            Error::Configuration(format!("type '{}' not found in schema", config.type_name))
        })?;
        let object = def.as_object().ok_or_else(|| {
            Error::Configuration(format!("type '{}' is not an object type", config.type_name))
        })?;
        Self::new(object.clone(), config)
    }

    /// Bind a model directly to an object type.
    pub fn new(object: ObjectType, config: &ModelConfig) -> Result<Self> {
        if object.name != config.type_name {
            return Err(Error::Configuration(format!(
                "model config names '{}' but object type is '{}'",
                config.type_name, object.name
            )));
        }
        if config.identity_field.is_empty() || object.field(&config.identity_field).is_none() {
            return Err(Error::Configuration(format!(
                "type '{}' has no identity field '{}'",
                object.name, config.identity_field
            )));
        }
        if config.identity_field != STORAGE_ID_FIELD && object.field(STORAGE_ID_FIELD).is_some() {
            return Err(Error::Configuration(format!(
                "type '{}' declares '{}' but uses '{}' as identity",
                object.name, STORAGE_ID_FIELD, config.identity_field
            )));
        }

        Ok(Self {
            identity_field: config.identity_field.clone(),
            create: config.operation(OperationKind::Create),
            update: config.operation(OperationKind::Update),
            delete: config.operation(OperationKind::Delete),
            object,
        })
    }

    /// Entity type name.
    pub fn type_name(&self) -> &str {
        &self.object.name
    }

    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    pub fn object(&self) -> &ObjectType {
        &self.object
    }

    /// Descriptor for a remote operation.
    pub fn operation(&self, kind: OperationKind) -> &OperationDescriptor {
        match kind {
            OperationKind::Create => &self.create,
            OperationKind::Update => &self.update,
            OperationKind::Delete => &self.delete,
        }
    }

    /// Split and validate the input to a create.
    pub fn create_input(&self, value: serde_json::Value) -> Result<RecordInput> {
        let input = RecordInput::from_value(value, &self.identity_field)?;
        self.object.validate_fields(&input.fields, &self.identity_field)?;
        Ok(input)
    }

    /// Split and validate the input to an update; the identity is required.
    pub fn update_input(&self, value: serde_json::Value) -> Result<(String, RecordInput)> {
        let mut input = RecordInput::from_value(value, &self.identity_field)?;
        let id = self.require_id(&mut input)?;
        self.object.validate_partial(&input.fields, &self.identity_field)?;
        Ok((id, input))
    }

    /// Pull the identity out of a delete input.
    pub fn delete_input(&self, value: serde_json::Value) -> Result<String> {
        let mut input = RecordInput::from_value(value, &self.identity_field)?;
        self.require_id(&mut input)
    }

    fn require_id(&self, input: &mut RecordInput) -> Result<String> {
        input.id.take().ok_or_else(|| {
            Error::InvalidInput(format!("missing identity field '{}'", self.identity_field))
        })
    }
}
