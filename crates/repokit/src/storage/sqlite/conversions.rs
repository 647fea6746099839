//! SQLite row and parameter conversions.
//!
//! Pure functions between JSON documents and SQLite values, testable without
//! a database.

use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::Row;
use serde_json::Value;

use repokit_core::storage::StoredRow;

/// Converts a JSON parameter into the SQLite value `json_extract` would
/// produce for the same member: booleans become 0/1, arrays and objects
/// their JSON text.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

pub fn to_sql_values(values: &[Value]) -> Vec<SqlValue> {
    values.iter().map(to_sql_value).collect()
}

/// Convert a SQLite row to a stored row.
///
/// Expected columns: key, data
pub fn row_to_stored(row: &Row) -> rusqlite::Result<StoredRow> {
    let key: String = row.get(0)?;
    let data: String = row.get(1)?;

    Ok(StoredRow {
        key,
        data: parse_document(&data, 1)?,
    })
}

/// Convert a projected member (JSON text, NULL when absent) to a value.
pub fn row_to_member(row: &Row) -> rusqlite::Result<Value> {
    let member: Option<String> = row.get(0)?;
    match member {
        Some(text) => parse_document(&text, 0),
        None => Ok(Value::Null),
    }
}

fn parse_document(s: &str, column: usize) -> rusqlite::Result<Value> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_match_json_extract() {
        assert_eq!(to_sql_value(&json!(null)), SqlValue::Null);
        assert_eq!(to_sql_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&json!(false)), SqlValue::Integer(0));
        assert_eq!(to_sql_value(&json!(42)), SqlValue::Integer(42));
        assert_eq!(to_sql_value(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(to_sql_value(&json!("abc")), SqlValue::Text("abc".to_string()));
    }

    #[test]
    fn test_composites_become_json_text() {
        assert_eq!(
            to_sql_value(&json!({ "a": [1, 2] })),
            SqlValue::Text("{\"a\":[1,2]}".to_string())
        );
    }

    #[test]
    fn test_parse_document_rejects_invalid_json() {
        let result = parse_document("{not json", 1);
        assert!(matches!(
            result,
            Err(rusqlite::Error::FromSqlConversionFailure(1, Type::Text, _))
        ));
    }
}
