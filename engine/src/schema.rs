//! Schema descriptor and field validation.
//!
//! The schema is consumed, never generated: it names the object types an
//! entity model can bind to and the fields each declares. Inputs to `add`
//! and `update` are checked against it before anything is written.

use crate::{
    error::Result,
    record::{json_type_name, LAST_UPDATED_FIELD, VERSION_FIELD},
    Error,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Identity; a string or integer
    Id,
    String,
    Int,
    Float,
    Bool,
    /// String-encoded or integer timestamp
    Timestamp,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Id => write!(f, "Id"),
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Timestamp => write!(f, "Timestamp"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in an object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether this field is required
    pub required: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&Value>) -> Result<()> {
        match value {
            None if self.required => Err(Error::MissingRequiredField(self.name.clone())),
            None => Ok(()),
            Some(Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            Some(Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::Id => value.is_string() || value.is_i64() || value.is_u64(),
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_f64() || value.is_i64() || value.is_u64(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Timestamp => value.is_string() || value.is_u64() || value.is_i64(),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

/// An object type: a named set of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectType {
    /// Type name
    pub name: String,
    /// Field definitions
    pub fields: Vec<FieldDef>,
}

impl ObjectType {
    /// Create a new object type.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Get a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate a full set of domain fields, as supplied to a create.
    ///
    /// The identity and metadata fields are managed by the engine and skipped.
    pub fn validate_fields(&self, fields: &Map<String, Value>, identity_field: &str) -> Result<()> {
        for field in self.domain_fields(identity_field) {
            field.validate(fields.get(&field.name))?;
        }
        Ok(())
    }

    /// Validate a partial set of domain fields, as supplied to an update.
    ///
    /// Only supplied fields are checked; undeclared fields pass through.
    pub fn validate_partial(
        &self,
        fields: &Map<String, Value>,
        identity_field: &str,
    ) -> Result<()> {
        for field in self.domain_fields(identity_field) {
            if let Some(value) = fields.get(&field.name) {
                field.validate(Some(value))?;
            }
        }
        Ok(())
    }

    fn domain_fields<'a>(&'a self, identity_field: &'a str) -> impl Iterator<Item = &'a FieldDef> {
        self.fields.iter().filter(move |f| {
            f.name != identity_field && f.name != VERSION_FIELD && f.name != LAST_UPDATED_FIELD
        })
    }
}

/// A named type in the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDef {
    Object(ObjectType),
    Scalar { name: String },
    Enum { name: String, values: Vec<String> },
}

impl TypeDef {
    /// Name of the type.
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Object(obj) => &obj.name,
            TypeDef::Scalar { name } => name,
            TypeDef::Enum { name, .. } => name,
        }
    }

    /// The object shape, if this is an object type.
    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            TypeDef::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// The full schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Types by name
    pub types: HashMap<String, TypeDef>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Add a type to the schema.
    pub fn add_type(&mut self, def: TypeDef) -> &mut Self {
        self.types.insert(def.name().to_string(), def);
        self
    }

    /// Builder-style method to add a type.
    pub fn with_type(mut self, def: TypeDef) -> Self {
        self.add_type(def);
        self
    }

    /// Builder-style method to add an object type.
    pub fn with_object(self, object: ObjectType) -> Self {
        self.with_type(TypeDef::Object(object))
    }

    /// Get a type by name.
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Parse a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn todo_type() -> ObjectType {
        ObjectType::new(
            "Todo",
            vec![
                FieldDef::required("id", FieldType::Id),
                FieldDef::required("title", FieldType::String),
                FieldDef::optional("done", FieldType::Bool),
                FieldDef::required("_version", FieldType::Int),
                FieldDef::required("_lastUpdatedAt", FieldType::Timestamp),
            ],
        )
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn validate_full_skips_managed_fields() {
        let todo = todo_type();
        assert!(todo
            .validate_fields(&fields(json!({"title": "Hello"})), "id")
            .is_ok());
    }

    #[test]
    fn validate_missing_required_field() {
        let todo = todo_type();
        let result = todo.validate_fields(&fields(json!({"done": true})), "id");
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "title"));
    }

    #[test]
    fn validate_wrong_type() {
        let todo = todo_type();
        let result = todo.validate_partial(&fields(json!({"done": "yes"})), "id");
        assert!(matches!(result, Err(Error::TypeMismatch { field, .. }) if field == "done"));
    }

    #[test]
    fn partial_ignores_absent_required_fields() {
        let todo = todo_type();
        assert!(todo
            .validate_partial(&fields(json!({"done": true})), "id")
            .is_ok());
    }

    #[test]
    fn partial_rejects_null_required_field() {
        let todo = todo_type();
        let result = todo.validate_partial(&fields(json!({"title": null})), "id");
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "title"));
    }

    #[test]
    fn undeclared_fields_pass_through() {
        let todo = todo_type();
        assert!(todo
            .validate_fields(&fields(json!({"title": "a", "extra": [1]})), "id")
            .is_ok());
    }

    #[test]
    fn field_type_display() {
        assert_eq!(FieldType::Id.to_string(), "Id");
        assert_eq!(FieldType::Json.to_string(), "Json");
    }

    #[test]
    fn schema_from_json() {
        let schema = Schema::from_json(
            r#"{
                "types": {
                    "Todo": {"kind": "object", "name": "Todo", "fields": [
                        {"name": "id", "fieldType": "id", "required": true},
                        {"name": "title", "fieldType": "string", "required": true}
                    ]},
                    "DateTime": {"kind": "scalar", "name": "DateTime"}
                }
            }"#,
        )
        .unwrap();

        assert!(schema.get_type("Todo").unwrap().as_object().is_some());
        assert!(schema.get_type("DateTime").unwrap().as_object().is_none());
    }

    #[test]
    fn schema_serialization() {
        let schema = Schema::new()
            .with_object(todo_type())
            .with_type(TypeDef::Enum {
                name: "Priority".into(),
                values: vec!["LOW".into(), "HIGH".into()],
            });
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, parsed);
    }
}
