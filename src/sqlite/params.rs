use rusqlite::types::Value;

use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Convert a rusqlite `Value` back into `RowValues`.
#[must_use]
pub fn sqlite_value_to_row_value(value: Value) -> RowValues {
    match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    }
}

/// Owned `SQLite` parameter list, movable onto a blocking worker.
#[derive(Debug, Clone, Default)]
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[RowValues]) -> Self {
        Params(params.iter().map(row_value_to_sqlite_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_booleans_and_json_to_sqlite_storage() {
        let params = Params::convert(&[
            RowValues::Bool(true),
            RowValues::JSON(json!({"a": 1})),
            RowValues::Null,
        ]);
        assert_eq!(
            params.0,
            vec![
                Value::Integer(1),
                Value::Text("{\"a\":1}".into()),
                Value::Null
            ]
        );
    }

    #[test]
    fn reads_back_storage_classes() {
        assert_eq!(sqlite_value_to_row_value(Value::Real(1.5)), RowValues::Float(1.5));
        assert_eq!(
            sqlite_value_to_row_value(Value::Text("x".into())),
            RowValues::Text("x".into())
        );
    }
}
