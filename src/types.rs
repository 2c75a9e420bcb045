use chrono::NaiveDateTime;
use serde_json::{Map, Number, Value as JsonValue};

/// A flat or nested row as the application sees it: column (or key) name to JSON value.
pub type Record = Map<String, JsonValue>;

/// Values that can be stored in a database row or bound as statement parameters.
///
/// ```rust
/// use cluster_dao::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value, bound as its serialized text
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Convert into the JSON shape used by [`Record`].
    ///
    /// Timestamps render as `YYYY-MM-DD HH:MM:SS`, blobs as arrays of bytes, and
    /// non-finite floats as `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            RowValues::Text(s) => JsonValue::String(s.clone()),
            RowValues::Bool(b) => JsonValue::Bool(*b),
            RowValues::Timestamp(dt) => JsonValue::String(dt.format("%F %T").to_string()),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(v) => v.clone(),
            RowValues::Blob(bytes) => {
                JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
            }
        }
    }
}

impl From<&JsonValue> for RowValues {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => RowValues::Int(i),
                None => n.as_f64().map_or(RowValues::Null, RowValues::Float),
            },
            JsonValue::String(s) => RowValues::Text(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => RowValues::JSON(value.clone()),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_owned())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

/// One argument consumed by a `?` or `??` token of a statement template.
///
/// `??` takes an identifier (a `Value(Text)` is accepted too). `?` takes a scalar,
/// a `List` which expands to `?, ?, ...`, or a `Record` which expands to
/// `` `col` = ?, ... `` assignments for `SET ?`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Identifier(String),
    Value(RowValues),
    List(Vec<RowValues>),
    Record(Record),
}

impl QueryValue {
    #[must_use]
    pub fn ident(name: impl Into<String>) -> Self {
        QueryValue::Identifier(name.into())
    }
}

impl From<RowValues> for QueryValue {
    fn from(value: RowValues) -> Self {
        QueryValue::Value(value)
    }
}

impl From<Record> for QueryValue {
    fn from(value: Record) -> Self {
        QueryValue::Record(value)
    }
}

impl From<Vec<RowValues>> for QueryValue {
    fn from(value: Vec<RowValues>) -> Self {
        QueryValue::List(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Value(RowValues::Int(value))
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Value(RowValues::Int(i64::from(value)))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Value(RowValues::Float(value))
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Value(RowValues::Bool(value))
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Value(RowValues::Text(value.to_owned()))
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Value(RowValues::Text(value))
    }
}

/// Outcome summary of an INSERT/UPDATE/DELETE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteResult {
    /// Row id generated by the last INSERT, 0 otherwise.
    pub insert_id: i64,
    pub affected_rows: usize,
    /// Rows touched by an UPDATE. Always 0 for INSERT and DELETE.
    pub changed_rows: usize,
}
