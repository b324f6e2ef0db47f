use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};

use crate::error::DataError;

/// Identifier of one record within a resource.
///
/// Backends disagree on identifier types, so both integer and string ids are
/// accepted. Serialized untagged, so `7` and `"rec7"` round-trip as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl RecordId {
    /// Interpret a JSON value as an identifier.
    ///
    /// Integral numbers become `Int`, strings become `Str`; anything else
    /// (floats, booleans, null, containers) is not a usable identifier.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) => Some(RecordId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(i) => Value::from(*i),
            RecordId::Str(s) => Value::from(s.clone()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RecordId::Int(i) => Some(*i),
            RecordId::Str(s) => s.parse().ok(),
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{i}"),
            RecordId::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<i32> for RecordId {
    fn from(value: i32) -> Self {
        RecordId::Int(value.into())
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Str(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Str(value)
    }
}

/// An open key/value record.
///
/// Records returned by providers always carry an `id` field equal to their
/// [`RecordId`], with backend attributes flattened to the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from a JSON value, rejecting anything that is not an
    /// object.
    pub fn from_value(value: Value) -> Result<Self, DataError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DataError::InvalidParams(format!(
                "expected a JSON object for a record, got {other}"
            ))),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// The record's identifier, if it has a usable `id` field.
    pub fn id(&self) -> Option<RecordId> {
        self.0.get("id").and_then(RecordId::from_value)
    }

    pub fn set_id(&mut self, id: &RecordId) {
        self.0.insert("id".to_string(), id.to_value());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Copy every field of `other` over this record.
    pub fn merge(&mut self, other: &Record) {
        for (k, v) in other.0.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// True when every field of `subset` is present here with an equal value.
    pub fn contains_all(&self, subset: &Record) -> bool {
        subset.0.iter().all(|(k, v)| self.0.get(k) == Some(v))
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl Deref for Record {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Record {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Build a [`Record`] from a `serde_json::json!` object literal.
///
/// Panics when the literal is not an object, so only use it with literals.
#[macro_export]
macro_rules! record {
    ($($tt:tt)*) => {
        match ::serde_json::json!({ $($tt)* }) {
            ::serde_json::Value::Object(map) => $crate::Record::from_map(map),
            _ => unreachable!(),
        }
    };
}
