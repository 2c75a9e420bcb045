use thiserror::Error;

use crate::types::QueryValue;

#[derive(Debug, Error)]
pub enum DaoError {
    /// A statement could not be executed. Carries the template and the values it was
    /// called with so the failing call can be reproduced.
    #[error("query failed: {sql} {values:?}: {source}")]
    QueryFailed {
        sql: String,
        values: Vec<QueryValue>,
        #[source]
        source: Box<DaoError>,
    },

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("No pool matches role: {0}")]
    PoolNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl DaoError {
    pub(crate) fn query_failed(sql: &str, values: Vec<QueryValue>, source: DaoError) -> Self {
        DaoError::QueryFailed {
            sql: sql.to_owned(),
            values,
            source: Box::new(source),
        }
    }

    /// The underlying cause, looking through `QueryFailed` wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &DaoError {
        match self {
            DaoError::QueryFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
