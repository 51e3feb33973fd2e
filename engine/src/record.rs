//! Record type and its flat JSON shape.

use crate::{clock::Stamp, error::Result, Error, RecordId, Version};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field carrying the version counter in the flat shape.
pub const VERSION_FIELD: &str = "_version";
/// Field carrying the last-update timestamp in the flat shape.
pub const LAST_UPDATED_FIELD: &str = "_lastUpdatedAt";
/// Key the identity is stored under, whatever the model's identity field.
pub const STORAGE_ID_FIELD: &str = "id";

/// A locally stored entity record.
///
/// In storage the identity is always kept under `id`; the model's own
/// identity field name is only applied by [`Record::to_value`] and
/// [`Record::from_value`]. `id` is therefore never a domain field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identity within one entity type
    pub id: RecordId,
    /// Version number, starts at 1 and increments on each accepted update
    #[serde(rename = "_version")]
    pub version: Version,
    /// Timestamp set by the mutator
    #[serde(rename = "_lastUpdatedAt")]
    pub last_updated_at: String,
    /// Domain fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a record. Non-object `fields` yield a record with no domain fields.
    pub fn new(
        id: impl Into<RecordId>,
        version: Version,
        last_updated_at: impl Into<String>,
        fields: Value,
    ) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            version,
            last_updated_at: last_updated_at.into(),
            fields,
        }
    }

    /// Current conflict metadata.
    pub fn stamp(&self) -> Stamp {
        Stamp::of(self)
    }

    /// Replace the conflict metadata.
    pub fn apply_stamp(&mut self, stamp: Stamp) {
        self.version = stamp.version;
        self.last_updated_at = stamp.last_updated_at;
    }

    /// Get a domain field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Overlay fields on top of the current ones.
    pub fn merge_fields(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            self.fields.insert(key, value);
        }
    }

    /// Flat object with the identity under `identity_field`.
    pub fn to_value(&self, identity_field: &str) -> Value {
        let mut obj = Map::with_capacity(self.fields.len() + 3);
        obj.insert(identity_field.to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.fields {
            obj.insert(key.clone(), value.clone());
        }
        obj.insert(VERSION_FIELD.to_string(), Value::from(self.version));
        obj.insert(
            LAST_UPDATED_FIELD.to_string(),
            Value::String(self.last_updated_at.clone()),
        );
        Value::Object(obj)
    }

    /// Parse a flat object, falling back to `fallback` for any missing identity
    /// or metadata.
    pub fn from_value(value: &Value, identity_field: &str, fallback: &Record) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidInput("record must be an object".into()))?;
        let input = RecordInput::split(obj.clone(), identity_field)?;

        Ok(Self {
            id: input.id.unwrap_or_else(|| fallback.id.clone()),
            version: input.version.unwrap_or(fallback.version),
            last_updated_at: input
                .last_updated_at
                .unwrap_or_else(|| fallback.last_updated_at.clone()),
            fields: input.fields,
        })
    }
}

/// Caller input split into identity, metadata and domain fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordInput {
    pub id: Option<RecordId>,
    pub version: Option<Version>,
    pub last_updated_at: Option<String>,
    pub fields: Map<String, Value>,
}

impl RecordInput {
    /// Split a flat input object.
    pub fn from_value(value: Value, identity_field: &str) -> Result<Self> {
        match value {
            Value::Object(obj) => Self::split(obj, identity_field),
            other => Err(Error::InvalidInput(format!(
                "input must be an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    fn split(mut obj: Map<String, Value>, identity_field: &str) -> Result<Self> {
        if identity_field != STORAGE_ID_FIELD && obj.contains_key(STORAGE_ID_FIELD) {
            return Err(Error::InvalidInput(format!(
                "field '{STORAGE_ID_FIELD}' is reserved when the identity is '{identity_field}'"
            )));
        }
        let id = match obj.remove(identity_field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                return Err(Error::TypeMismatch {
                    field: identity_field.to_string(),
                    expected: "Id".into(),
                    got: json_type_name(&other).into(),
                })
            }
        };
        let version = match obj.remove(VERSION_FIELD) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_u64().ok_or_else(|| Error::TypeMismatch {
                field: VERSION_FIELD.into(),
                expected: "Int".into(),
                got: json_type_name(&v).into(),
            })?),
        };
        let last_updated_at = match obj.remove(LAST_UPDATED_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                return Err(Error::TypeMismatch {
                    field: LAST_UPDATED_FIELD.into(),
                    expected: "String".into(),
                    got: json_type_name(&other).into(),
                })
            }
        };
        Ok(Self {
            id,
            version,
            last_updated_at,
            fields: obj,
        })
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}
