//! Conversions between JSON values and `sqlx::Any` binds and rows.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row, TypeInfo, ValueRef};

use crudkit_data::Record;

pub(crate) type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Bind JSON values in order. Arrays and objects are stored as JSON text.
pub(crate) fn bind_values<'q>(mut query: AnyQuery<'q>, values: &[Value]) -> AnyQuery<'q> {
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// Decode every column of `row` into a record keyed by column name.
pub(crate) fn decode_row(row: &AnyRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        record.insert(column.name().to_string(), decode_value(row, idx)?);
    }
    Ok(record)
}

/// Decode one cell, dispatching on the runtime type of the value.
pub(crate) fn decode_value(row: &AnyRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let kind = raw.type_info().name().to_ascii_uppercase();
    let value = match kind.as_str() {
        "BOOLEAN" => Value::from(row.try_get::<bool, _>(idx)?),
        "SMALLINT" => Value::from(row.try_get::<i16, _>(idx)?),
        "INTEGER" => Value::from(row.try_get::<i32, _>(idx)?),
        "BIGINT" => Value::from(row.try_get::<i64, _>(idx)?),
        "REAL" => Value::from(f64::from(row.try_get::<f32, _>(idx)?)),
        "DOUBLE" => Value::from(row.try_get::<f64, _>(idx)?),
        "BLOB" => Value::from(STANDARD.encode(row.try_get::<Vec<u8>, _>(idx)?)),
        _ => Value::from(row.try_get::<String, _>(idx)?),
    };
    Ok(value)
}

/// Rename the primary-key column to `id` in a decoded record.
pub(crate) fn expose_id(mut record: Record, id_column: &str) -> Record {
    if id_column != "id" {
        if let Some(value) = record.remove(id_column) {
            record.insert("id".to_string(), value);
        }
    }
    record
}

/// Rename an incoming `id` field to the primary-key column.
pub(crate) fn hide_id(mut record: Record, id_column: &str) -> Record {
    if id_column != "id" {
        if let Some(value) = record.remove("id") {
            record.insert(id_column.to_string(), value);
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudkit_data::record;
    use serde_json::json;

    #[test]
    fn id_column_is_renamed_both_ways() {
        let stored = hide_id(record! { "id": 4, "name": "a" }, "customer_id");
        assert_eq!(stored.get("customer_id"), Some(&json!(4)));
        assert!(stored.get("id").is_none());

        let exposed = expose_id(stored, "customer_id");
        assert_eq!(exposed, record! { "id": 4, "name": "a" });
    }

    #[test]
    fn default_id_column_is_untouched() {
        let rec = record! { "id": 1 };
        assert_eq!(hide_id(rec.clone(), "id"), rec);
        assert_eq!(expose_id(rec.clone(), "id"), rec);
    }
}
