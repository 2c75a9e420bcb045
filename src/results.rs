use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::types::{Record, RowValues, WriteResult};

/// Column metadata reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    /// Declared column type, when the driver knows it.
    pub decl_type: Option<String>,
}

impl FieldInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decl_type: None,
        }
    }

    #[must_use]
    pub fn with_decl_type(mut self, decl_type: Option<&str>) -> Self {
        self.decl_type = decl_type.map(str::to_string);
        self
    }
}

/// A single row: values in column order, sharing column names with its result set.
#[derive(Debug, Clone)]
pub struct DbRow {
    pub fields: Arc<Vec<FieldInfo>>,
    pub values: Vec<RowValues>,
}

impl DbRow {
    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.fields
            .iter()
            .position(|field| field.name == column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Flatten into a [`Record`]. When a column name repeats (joins without
    /// aliases), the last column wins.
    #[must_use]
    pub fn to_record(&self) -> Record {
        self.fields
            .iter()
            .zip(&self.values)
            .map(|(field, value)| (field.name.clone(), value.to_json()))
            .collect()
    }
}

/// Everything a driver returns for one statement.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub fields: Arc<Vec<FieldInfo>>,
    pub rows: Vec<DbRow>,
    pub summary: WriteResult,
}

impl ResultSet {
    /// Result of a statement that produced no rows.
    #[must_use]
    pub fn from_write(summary: WriteResult) -> Self {
        Self {
            fields: Arc::new(Vec::new()),
            rows: Vec::new(),
            summary,
        }
    }

    /// Create an empty row-returning result with the given columns.
    #[must_use]
    pub fn with_fields(fields: Vec<FieldInfo>, capacity: usize) -> Self {
        Self {
            fields: Arc::new(fields),
            rows: Vec::with_capacity(capacity),
            summary: WriteResult::default(),
        }
    }

    /// Add a row, sharing this set's column list.
    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        self.rows.push(DbRow {
            fields: Arc::clone(&self.fields),
            values,
        });
    }
}

/// The statement as it went to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHandle {
    /// SQL after `??`/`?` expansion.
    pub sql: String,
    pub values: Vec<RowValues>,
}

/// Envelope returned by `Db::query`.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub rows: Vec<Record>,
    pub fields: Arc<Vec<FieldInfo>>,
    pub summary: WriteResult,
    pub query: QueryHandle,
}

/// Envelope returned by the fetch helpers: shaped data plus the metadata of the
/// statement that produced it.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    pub fields: Arc<Vec<FieldInfo>>,
    pub query: QueryHandle,
}

impl<T> Fetched<T> {
    pub fn into_data(self) -> T {
        self.data
    }
}

/// Result of an INSERT/UPDATE/DELETE. A failed write still carries a zeroed
/// [`WriteResult`]; check `error` rather than the counters, since a legitimate no-op
/// update also reports zero rows.
#[derive(Debug)]
#[must_use]
pub struct WriteOutcome {
    pub error: Option<crate::error::DaoError>,
    pub result: WriteResult,
}

impl WriteOutcome {
    pub(crate) fn ok(result: WriteResult) -> Self {
        Self {
            error: None,
            result,
        }
    }

    pub(crate) fn failed(error: crate::error::DaoError) -> Self {
        Self {
            error: Some(error),
            result: WriteResult::default(),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result` for callers that prefer `?`.
    ///
    /// # Errors
    /// Returns the write error when the statement failed.
    pub fn into_result(self) -> Result<WriteResult, crate::error::DaoError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result),
        }
    }
}

/// First row's value for `field`: `None` when there are no rows, `Null` when the
/// column is missing.
pub(crate) fn scalar_field(rows: &[Record], field: &str) -> Option<JsonValue> {
    rows.first()
        .map(|row| row.get(field).cloned().unwrap_or(JsonValue::Null))
}
