use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bb8::PooledConnection;
use tokio::task::spawn_blocking;

use crate::cluster::ClusterConnection;
use crate::error::DaoError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::config::{SharedSqliteConnection, SqliteManager};
use super::params::Params;
use super::query::run_statement;

/// A connection checked out of one node's pool. Returned to the pool on drop.
pub struct SqliteConnection {
    node: String,
    conn: PooledConnection<'static, SqliteManager>,
}

impl SqliteConnection {
    pub(crate) fn new(
        node: impl Into<String>,
        conn: PooledConnection<'static, SqliteManager>,
    ) -> Self {
        Self {
            node: node.into(),
            conn,
        }
    }

    /// Id of the node this connection came from.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Run a parameterless batch, e.g. DDL.
    ///
    /// # Errors
    /// Returns `DaoError::SqliteError` if any statement fails.
    pub async fn execute_batch(&mut self, sql: &str) -> Result<(), DaoError> {
        let sql = sql.to_owned();
        run_blocking(self.conn_handle(), move |conn| {
            conn.execute_batch(&sql).map_err(DaoError::SqliteError)
        })
        .await
    }

    fn conn_handle(&self) -> SharedSqliteConnection {
        Arc::clone(&*self.conn)
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ClusterConnection for SqliteConnection {
    async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, DaoError> {
        let sql = sql.to_owned();
        let params = Params::convert(params);
        run_blocking(self.conn_handle(), move |conn| run_statement(conn, &sql, &params.0)).await
    }
}

async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, DaoError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, DaoError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| DaoError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
