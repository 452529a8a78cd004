//! Conversion of SQLite values to JSON rows.

use rusqlite::types::ValueRef;
use serde_json::{Map, Value as JsonValue};
use strata_core::Row;

/// Convert a SQLite ValueRef to a JSON Value.
///
/// Text that parses as a JSON object or array is returned as that value.
/// Blobs that are not UTF-8 become arrays of byte values.
pub fn from_sqlite_value(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Text(bytes) => {
            let s = String::from_utf8_lossy(bytes).into_owned();
            if s.starts_with('{') || s.starts_with('[') {
                serde_json::from_str(&s).unwrap_or(JsonValue::String(s))
            } else {
                JsonValue::String(s)
            }
        }
        ValueRef::Blob(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => JsonValue::String(s.to_string()),
            Err(_) => JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect()),
        },
    }
}

/// Build a JSON object from a row, keyed by column name.
pub(crate) fn row_to_json(row: &rusqlite::Row<'_>, columns: &[String]) -> Row {
    let mut map = Map::with_capacity(columns.len());
    for (i, col) in columns.iter().enumerate() {
        let value = row.get_ref(i).map(from_sqlite_value).unwrap_or(JsonValue::Null);
        map.insert(col.clone(), value);
    }
    JsonValue::Object(map)
}
