use std::fmt;

use async_trait::async_trait;
use bb8::Pool;

use crate::cluster::{Cluster, Dialect, NodeSet};
use crate::error::DaoError;

use super::config::{ClusterOptions, ClusterOptionsBuilder, SqliteManager};
use super::connection::SqliteConnection;

/// Named SQLite pools addressed by role tokens.
///
/// Point a `master` node and one or more `slave*` nodes at the same file (or at
/// replicas kept in sync elsewhere) and hand the cluster to [`crate::Db`].
pub struct SqliteCluster {
    nodes: NodeSet<Pool<SqliteManager>>,
}

impl SqliteCluster {
    #[must_use]
    pub fn builder() -> ClusterOptionsBuilder {
        ClusterOptionsBuilder::new()
    }

    /// Open one pool per node.
    ///
    /// # Errors
    /// Returns `DaoError::ConfigError` for invalid options, or
    /// `DaoError::ConnectionError` if a pool cannot open its first connection.
    pub async fn new(opts: ClusterOptions) -> Result<Self, DaoError> {
        opts.validate()?;
        let mut nodes = NodeSet::new(opts.selector);
        for node in opts.nodes {
            let pool = SqliteManager::new(node.path.clone(), opts.init_sql.clone())
                .build_pool(node.max_size)
                .await?;
            tracing::debug!(node = %node.id, path = %node.path, "sqlite pool ready");
            nodes.add(node.id, pool)?;
        }
        Ok(Self { nodes })
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.ids()
    }
}

impl fmt::Debug for SqliteCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCluster")
            .field("nodes", &self.nodes.ids().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl Cluster for SqliteCluster {
    type Connection = SqliteConnection;

    async fn get_connection(&self, role: &str) -> Result<SqliteConnection, DaoError> {
        let mut last_error = None;
        for (id, pool) in self.nodes.select(role)? {
            match pool.get_owned().await {
                Ok(conn) => return Ok(SqliteConnection::new(id, conn)),
                Err(e) => {
                    tracing::warn!(node = %id, role = %role, error = %e, "sqlite checkout failed");
                    last_error = Some(format!("{id}: {e}"));
                }
            }
        }
        Err(DaoError::ConnectionError(format!(
            "no connection available for role {role}: {}",
            last_error.unwrap_or_default()
        )))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}
