use std::future::Future;
use std::sync::Arc;

use bb8::{ManageConnection, Pool};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cluster::Selector;
use crate::error::DaoError;

use super::cluster::SqliteCluster;

/// Connection shared between the pool and blocking workers.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

const DEFAULT_INIT_SQL: &str = "PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL;";

fn default_max_size() -> u32 {
    4
}

fn default_init_sql() -> String {
    DEFAULT_INIT_SQL.to_string()
}

/// One pool in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOptions {
    /// Name matched against role tokens, e.g. `master` or `slave1`.
    pub id: String,
    /// Database file path or `file:` URI.
    pub path: String,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
}

/// Options for a SQLite-backed pool cluster.
///
/// Loadable from JSON:
/// ```rust
/// use cluster_dao::sqlite::ClusterOptions;
///
/// let opts = ClusterOptions::from_json_str(r#"{
///     "nodes": [
///         {"id": "master", "path": "app.db"},
///         {"id": "slave1", "path": "app.db", "max_size": 8}
///     ],
///     "selector": "order"
/// }"#).unwrap();
/// assert_eq!(opts.nodes.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterOptions {
    pub nodes: Vec<NodeOptions>,
    #[serde(default)]
    pub selector: Selector,
    /// Batch run on every new connection.
    #[serde(default = "default_init_sql")]
    pub init_sql: String,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            selector: Selector::default(),
            init_sql: default_init_sql(),
        }
    }
}

impl ClusterOptions {
    /// # Errors
    /// Returns `DaoError::ConfigError` on malformed JSON or invalid options.
    pub fn from_json_str(json: &str) -> Result<Self, DaoError> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| DaoError::ConfigError(format!("invalid cluster options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// Returns `DaoError::ConfigError` when there are no nodes or a node has a zero pool size.
    /// Node id rules are enforced when the cluster is built.
    pub fn validate(&self) -> Result<(), DaoError> {
        if self.nodes.is_empty() {
            return Err(DaoError::ConfigError("cluster needs at least one node".into()));
        }
        if let Some(node) = self.nodes.iter().find(|n| n.max_size == 0) {
            return Err(DaoError::ConfigError(format!(
                "node {} has max_size 0",
                node.id
            )));
        }
        Ok(())
    }
}

/// Fluent builder for [`ClusterOptions`].
#[derive(Debug, Clone, Default)]
pub struct ClusterOptionsBuilder {
    opts: ClusterOptions,
}

impl ClusterOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn node(self, id: impl Into<String>, path: impl Into<String>) -> Self {
        self.node_with_size(id, path, default_max_size())
    }

    #[must_use]
    pub fn node_with_size(
        mut self,
        id: impl Into<String>,
        path: impl Into<String>,
        max_size: u32,
    ) -> Self {
        self.opts.nodes.push(NodeOptions {
            id: id.into(),
            path: path.into(),
            max_size,
        });
        self
    }

    #[must_use]
    pub fn selector(mut self, selector: Selector) -> Self {
        self.opts.selector = selector;
        self
    }

    #[must_use]
    pub fn init_sql(mut self, sql: impl Into<String>) -> Self {
        self.opts.init_sql = sql.into();
        self
    }

    #[must_use]
    pub fn finish(self) -> ClusterOptions {
        self.opts
    }

    /// Build the cluster, opening every pool.
    ///
    /// # Errors
    /// Returns `DaoError` if the options are invalid or a pool cannot be created.
    pub async fn build(self) -> Result<SqliteCluster, DaoError> {
        SqliteCluster::new(self.finish()).await
    }
}

/// bb8 manager for rusqlite connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    path: String,
    init_sql: String,
}

impl SqliteManager {
    #[must_use]
    pub fn new(path: impl Into<String>, init_sql: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            init_sql: init_sql.into(),
        }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `DaoError::ConnectionError` if the first connection cannot be opened.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<SqliteManager>, DaoError> {
        let path = self.path.clone();
        Pool::builder()
            .max_size(max_size)
            .build(self)
            .await
            .map_err(|e| DaoError::ConnectionError(format!("sqlite pool error for {path}: {e}")))
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = rusqlite::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.path.clone();
        let init_sql = self.init_sql.clone();
        async move {
            let conn = rusqlite::Connection::open(&path)?;
            if !init_sql.is_empty() {
                conn.execute_batch(&init_sql)?;
            }
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let conn = Arc::clone(conn);
        async move {
            let guard = conn.lock().await;
            guard.execute_batch("SELECT 1")
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_options_fill_defaults() {
        let opts =
            ClusterOptions::from_json_str(r#"{"nodes":[{"id":"master","path":":memory:"}]}"#)
                .unwrap();
        assert_eq!(opts.selector, Selector::RoundRobin);
        assert_eq!(opts.nodes[0].max_size, 4);
        assert_eq!(opts.init_sql, DEFAULT_INIT_SQL);
    }

    #[test]
    fn empty_or_zero_sized_clusters_are_rejected() {
        assert!(matches!(
            ClusterOptions::from_json_str(r#"{"nodes":[]}"#),
            Err(DaoError::ConfigError(_))
        ));
        let opts = ClusterOptionsBuilder::new()
            .node_with_size("master", ":memory:", 0)
            .finish();
        assert!(opts.validate().is_err());
    }

    #[test]
    fn builder_collects_nodes_in_order() {
        let opts = ClusterOptionsBuilder::new()
            .node("master", "a.db")
            .node("slave1", "a.db")
            .selector(Selector::Order)
            .init_sql("")
            .finish();
        let ids: Vec<&str> = opts.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["master", "slave1"]);
        assert_eq!(opts.selector, Selector::Order);
        assert!(opts.init_sql.is_empty());
    }
}
