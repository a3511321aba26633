use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The field every stored record is identified by.
pub const ID_FIELD: &str = "id";

/// Numeric identity of a record.
///
/// Positive values are canonical ids assigned by the remote source. Negative
/// values are provisional placeholders handed out locally (counting down from
/// -1) before the canonical id is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Creates a record id from a raw numeric value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// Returns true for locally assigned placeholder ids.
    #[must_use]
    pub const fn is_provisional(&self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// The identity state of a raw or stored record.
///
/// A `serde_json` object distinguishes an absent key from an explicit null,
/// and the store semantics need exactly that distinction: records lacking the
/// identity field entirely are silently excluded, while an explicit null
/// means "not yet matched against any stored identity".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// The identity field is absent entirely.
    Missing,
    /// The identity field is present but null (or not a usable integer).
    Unassigned,
    /// A concrete identity.
    Assigned(RecordId),
}

impl Identity {
    /// Reads the identity state out of a raw field map.
    #[must_use]
    pub fn of(values: &Map<String, Value>) -> Self {
        match values.get(ID_FIELD) {
            None => Identity::Missing,
            Some(Value::Null) => Identity::Unassigned,
            Some(value) => match value.as_i64() {
                Some(id) => Identity::Assigned(RecordId::new(id)),
                None => Identity::Unassigned,
            },
        }
    }

    /// Returns the concrete id, if one is assigned.
    #[must_use]
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Identity::Assigned(id) => Some(*id),
            _ => None,
        }
    }
}

/// A generic record held in a Remora repository.
///
/// All remote data flows through this type. The `values` map holds every
/// declared field, including the identity field; its structure is defined by
/// the remote resource, not by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Which registered schema governs this record.
    pub entity_type: String,
    /// All fields, identity included.
    pub values: Map<String, Value>,
    /// Origin tag: set by the repository once the record has entered a
    /// dataset, false on drafts and freshly decoded payloads.
    #[serde(skip)]
    pub persisted: bool,
}

impl Record {
    /// Creates a record from an already-decoded field map.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            entity_type: entity_type.into(),
            values,
            persisted: false,
        }
    }

    /// Creates a record from a JSON value, which must be an object.
    pub fn from_value(entity_type: impl Into<String>, value: Value) -> ModelResult<Self> {
        match value {
            Value::Object(values) => Ok(Self::new(entity_type, values)),
            other => Err(ModelError::NotAnObject(json_kind(&other))),
        }
    }

    /// The identity state of this record.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::of(&self.values)
    }

    /// The concrete identity, if assigned.
    #[must_use]
    pub fn id(&self) -> Option<RecordId> {
        self.identity().record_id()
    }

    /// Overwrites the identity field.
    pub fn set_id(&mut self, id: RecordId) {
        self.values.insert(ID_FIELD.to_string(), Value::from(id.get()));
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Extract a string field.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }

    /// Extract a boolean field.
    #[must_use]
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.values.get(field).and_then(Value::as_bool)
    }

    /// Extract a numeric field.
    #[must_use]
    pub fn get_number(&self, field: &str) -> Option<f64> {
        self.values.get(field).and_then(Value::as_f64)
    }

    /// Sets a field value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    /// True when the field is present and non-null.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.values.get(field).is_some_and(|v| !v.is_null())
    }

    /// The record's fields as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
