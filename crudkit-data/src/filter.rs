//! Filter model shared by every provider.
//!
//! A [`Filter`] maps field names to either a bare value (equality) or an
//! operator object `{ "operator": "...", "value": ... }`. The model never
//! rejects a filter: providers translate what they can and raise
//! [`DataError::Translation`] for the rest.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::DataError;

/// Comparison operators understood by the filter model.
///
/// Operator names that are not part of the vocabulary are kept as
/// [`FilterOperator::Other`] so a provider can report them instead of
/// silently ignoring the condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Null,
    NotNull,
    Between,
    Other(String),
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 14] = [
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::Null,
        FilterOperator::NotNull,
        FilterOperator::Between,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
            FilterOperator::Null => "null",
            FilterOperator::NotNull => "notNull",
            FilterOperator::Between => "between",
            FilterOperator::Other(name) => name,
        }
    }

    /// Parse an operator name; unknown names become [`FilterOperator::Other`].
    pub fn from_name(s: &str) -> Self {
        match s {
            "eq" => FilterOperator::Eq,
            "ne" => FilterOperator::Ne,
            "lt" => FilterOperator::Lt,
            "lte" => FilterOperator::Lte,
            "gt" => FilterOperator::Gt,
            "gte" => FilterOperator::Gte,
            "contains" => FilterOperator::Contains,
            "startsWith" => FilterOperator::StartsWith,
            "endsWith" => FilterOperator::EndsWith,
            "in" => FilterOperator::In,
            "notIn" => FilterOperator::NotIn,
            "null" => FilterOperator::Null,
            "notNull" => FilterOperator::NotNull,
            "between" => FilterOperator::Between,
            other => FilterOperator::Other(other.to_string()),
        }
    }
}

impl FromStr for FilterOperator {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FilterOperator::from_name(s))
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The right-hand side of one filter entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Bare value, meaning equality.
    Eq(Value),
    Op { operator: FilterOperator, value: Value },
}

impl FilterValue {
    /// Classify a raw JSON value. Objects with a string `operator` key (and
    /// at most a `value` key besides) are operator filters, everything else
    /// is equality.
    pub fn from_value(value: Value) -> Self {
        if let Value::Object(map) = &value {
            let only_op_keys = map.keys().all(|k| k == "operator" || k == "value");
            if let (true, Some(Value::String(op))) = (only_op_keys, map.get("operator")) {
                let operator = FilterOperator::from_name(op);
                let inner = map.get("value").cloned().unwrap_or(Value::Null);
                return FilterValue::Op {
                    operator,
                    value: inner,
                };
            }
        }
        FilterValue::Eq(value)
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FilterValue::Eq(value) => value.serialize(serializer),
            FilterValue::Op { operator, value } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("operator", operator.as_str())?;
                map.serialize_entry("value", value)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FilterValue::from_value)
    }
}

/// One normalized `field <operator> value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition<'a> {
    pub field: &'a str,
    pub operator: &'a FilterOperator,
    pub value: &'a Value,
}

impl<'a> Condition<'a> {
    /// The array operand of `in`/`notIn`.
    pub fn list(&self, provider: &'static str, resource: &str) -> Result<&'a [Value], DataError> {
        match self.value {
            Value::Array(items) => Ok(items.as_slice()),
            other => Err(DataError::translation(
                provider,
                resource,
                format!(
                    "operator '{}' on '{}' expects an array, got {other}",
                    self.operator, self.field
                ),
            )),
        }
    }

    /// The `[low, high]` operand of `between`.
    pub fn range(
        &self,
        provider: &'static str,
        resource: &str,
    ) -> Result<(&'a Value, &'a Value), DataError> {
        match self.value {
            Value::Array(items) if items.len() == 2 => Ok((&items[0], &items[1])),
            other => Err(DataError::translation(
                provider,
                resource,
                format!(
                    "operator 'between' on '{}' expects a two-element array, got {other}",
                    self.field
                ),
            )),
        }
    }

    /// The textual operand of `contains`/`startsWith`/`endsWith`.
    pub fn text(&self, provider: &'static str, resource: &str) -> Result<String, DataError> {
        match self.value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(DataError::translation(
                provider,
                resource,
                format!(
                    "operator '{}' on '{}' expects a string, got {other}",
                    self.operator, self.field
                ),
            )),
        }
    }

    /// Error for an operator the provider has no native equivalent for.
    pub fn unsupported(&self, provider: &'static str, resource: &str) -> DataError {
        DataError::translation(
            provider,
            resource,
            format!("operator '{}' on '{}' is not supported", self.operator, self.field),
        )
    }
}

/// Field → condition map. Entries combine with logical AND.
///
/// Backed by a `BTreeMap` so translated queries are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(BTreeMap<String, FilterValue>);

static EQ: FilterOperator = FilterOperator::Eq;

impl Filter {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add an equality condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), FilterValue::Eq(value.into()));
        self
    }

    /// Add an operator condition.
    pub fn op(
        mut self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        self.0.insert(
            field.into(),
            FilterValue::Op {
                operator,
                value: value.into(),
            },
        );
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FilterValue) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.0.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<FilterValue> {
        self.0.remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate the entries as normalized conditions, bare values becoming `eq`.
    pub fn conditions(&self) -> impl Iterator<Item = Condition<'_>> {
        self.0.iter().map(|(field, value)| match value {
            FilterValue::Eq(value) => Condition {
                field,
                operator: &EQ,
                value,
            },
            FilterValue::Op { operator, value } => Condition {
                field,
                operator,
                value,
            },
        })
    }
}

impl FromIterator<(String, FilterValue)> for Filter {
    fn from_iter<I: IntoIterator<Item = (String, FilterValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
