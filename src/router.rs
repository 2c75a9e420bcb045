//! Role-routed execution.
//!
//! [`Db`] resolves a role token to a connection through its [`Cluster`], runs one
//! statement and shapes the result. Every operation comes in two forms: `op` uses the
//! default role for its class (master for `query` and writes, the slave group for
//! fetches) and `op_on` takes the role explicitly.
//!
//! Reads fail hard: any error comes back as [`DaoError::QueryFailed`]. Writes never
//! return `Err`; a failure yields a [`WriteOutcome`] with the error and zeroed counters.

use std::sync::{PoisonError, RwLock};

use serde_json::Value as JsonValue;

use crate::cluster::{Cluster, ClusterConnection, Dialect};
use crate::error::DaoError;
use crate::normalizer::RecordNormalizer;
use crate::results::{DbRow, Fetched, QueryHandle, QueryResult, WriteOutcome, scalar_field};
use crate::template;
use crate::types::{QueryValue, Record, RowValues};

/// Role tokens used when an operation is called without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleConfig {
    /// Writes and strongly consistent reads.
    pub master: String,
    /// Reads. Usually a wildcard over replica node ids.
    pub slave: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            master: "master".to_string(),
            slave: "slave*".to_string(),
        }
    }
}

/// WHERE clauses for `update`/`delete`, joined with a space. Build multi-clause lists
/// with [`crate::sql_builder::push_where`] so each clause after the first carries its
/// operand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Where(Vec<String>);

impl Where {
    /// No WHERE clause: the statement applies to every row.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn render(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join(" "))
        }
    }
}

impl From<&str> for Where {
    fn from(clause: &str) -> Self {
        Where(vec![clause.to_string()])
    }
}

impl From<String> for Where {
    fn from(clause: String) -> Self {
        Where(vec![clause])
    }
}

impl From<Vec<String>> for Where {
    fn from(clauses: Vec<String>) -> Self {
        Where(clauses)
    }
}

impl From<&[String]> for Where {
    fn from(clauses: &[String]) -> Self {
        Where(clauses.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for Where {
    fn from(clauses: [&str; N]) -> Self {
        Where(clauses.iter().map(|c| (*c).to_string()).collect())
    }
}

/// Data-access entry point over a [`Cluster`].
pub struct Db<C> {
    cluster: C,
    roles: RwLock<RoleConfig>,
    normalizer: RecordNormalizer,
}

impl<C: Cluster> Db<C> {
    /// Router with default roles and a normalizer with no default fields, which keeps
    /// every column and only coerces timestamps.
    pub fn new(cluster: C) -> Self {
        Self::with_normalizer(cluster, RecordNormalizer::default())
    }

    pub fn with_normalizer(cluster: C, normalizer: RecordNormalizer) -> Self {
        Self {
            cluster,
            roles: RwLock::new(RoleConfig::default()),
            normalizer,
        }
    }

    #[must_use]
    pub fn with_roles(mut self, roles: RoleConfig) -> Self {
        self.roles = RwLock::new(roles);
        self
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    pub fn normalizer(&self) -> &RecordNormalizer {
        &self.normalizer
    }

    pub fn set_master_role(&self, token: impl Into<String>) {
        self.roles.write().unwrap_or_else(PoisonError::into_inner).master = token.into();
    }

    pub fn set_slave_role(&self, token: impl Into<String>) {
        self.roles.write().unwrap_or_else(PoisonError::into_inner).slave = token.into();
    }

    pub fn roles(&self) -> RoleConfig {
        self.roles.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn master_role(&self) -> String {
        self.roles().master
    }

    pub fn slave_role(&self) -> String {
        self.roles().slave
    }

    /// Run a statement on the master role.
    ///
    /// # Errors
    /// Returns `DaoError::QueryFailed` carrying the template, values and cause.
    pub async fn query(&self, sql: &str, values: &[QueryValue]) -> Result<QueryResult, DaoError> {
        self.query_on(&self.master_role(), sql, values).await
    }

    /// Run a statement on `role`. The connection goes back to its pool before this
    /// returns, whatever the outcome.
    ///
    /// # Errors
    /// Returns `DaoError::QueryFailed` carrying the template, values and cause.
    pub async fn query_on(
        &self,
        role: &str,
        sql: &str,
        values: &[QueryValue],
    ) -> Result<QueryResult, DaoError> {
        match self.run(role, sql, values).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(
                    role = %role,
                    sql = %sql,
                    values = ?values,
                    error = %e,
                    "query failed"
                );
                Err(DaoError::query_failed(sql, values.to_vec(), e))
            }
        }
    }

    async fn run(
        &self,
        role: &str,
        sql: &str,
        values: &[QueryValue],
    ) -> Result<QueryResult, DaoError> {
        let expanded = template::expand_with(self.cluster.dialect(), sql, values)?;
        let mut conn = self.cluster.get_connection(role).await?;
        tracing::debug!(role = %role, sql = %expanded.sql, "query");
        let outcome = conn.query(&expanded.sql, &expanded.params).await;
        drop(conn);

        let result_set = outcome?;
        Ok(QueryResult {
            rows: result_set.rows.iter().map(DbRow::to_record).collect(),
            fields: result_set.fields,
            summary: result_set.summary,
            query: QueryHandle {
                sql: expanded.sql,
                values: expanded.params,
            },
        })
    }

    /// Shortcut for [`query_on`](Self::query_on) with the master role.
    ///
    /// # Errors
    /// See [`query_on`](Self::query_on).
    pub async fn master(&self, sql: &str, values: &[QueryValue]) -> Result<QueryResult, DaoError> {
        self.query_on(&self.master_role(), sql, values).await
    }

    /// Shortcut for [`query_on`](Self::query_on) with the slave role.
    ///
    /// # Errors
    /// See [`query_on`](Self::query_on).
    pub async fn slave(&self, sql: &str, values: &[QueryValue]) -> Result<QueryResult, DaoError> {
        self.query_on(&self.slave_role(), sql, values).await
    }

    /// First row's `field` from the slave role. `None` when there are no rows.
    ///
    /// # Errors
    /// See [`query_on`](Self::query_on).
    pub async fn fetch_scalar_field(
        &self,
        sql: &str,
        values: &[QueryValue],
        field: &str,
    ) -> Result<Fetched<Option<JsonValue>>, DaoError> {
        self.fetch_scalar_field_on(&self.slave_role(), sql, values, field)
            .await
    }

    /// # Errors
    /// See [`query_on`](Self::query_on).
    pub async fn fetch_scalar_field_on(
        &self,
        role: &str,
        sql: &str,
        values: &[QueryValue],
        field: &str,
    ) -> Result<Fetched<Option<JsonValue>>, DaoError> {
        let result = self.query_on(role, sql, values).await?;
        Ok(Fetched {
            data: scalar_field(&result.rows, field),
            fields: result.fields,
            query: result.query,
        })
    }

    /// First row from the slave role, normalized. `None` when there are no rows.
    ///
    /// # Errors
    /// See [`query_on`](Self::query_on).
    pub async fn fetch_one(
        &self,
        sql: &str,
        values: &[QueryValue],
    ) -> Result<Fetched<Option<Record>>, DaoError> {
        self.fetch_one_on(&self.slave_role(), sql, values).await
    }

    /// # Errors
    /// See [`query_on`](Self::query_on).
    pub async fn fetch_one_on(
        &self,
        role: &str,
        sql: &str,
        values: &[QueryValue],
    ) -> Result<Fetched<Option<Record>>, DaoError> {
        let result = self.query_on(role, sql, values).await?;
        let data = result
            .rows
            .into_iter()
            .next()
            .map(|row| self.normalizer.normalize(row));
        Ok(Fetched {
            data,
            fields: result.fields,
            query: result.query,
        })
    }

    /// Every row from the slave role, normalized. Empty when nothing matches.
    ///
    /// # Errors
    /// See [`query_on`](Self::query_on).
    pub async fn fetch_all(
        &self,
        sql: &str,
        values: &[QueryValue],
    ) -> Result<Fetched<Vec<Record>>, DaoError> {
        self.fetch_all_on(&self.slave_role(), sql, values).await
    }

    /// # Errors
    /// See [`query_on`](Self::query_on).
    pub async fn fetch_all_on(
        &self,
        role: &str,
        sql: &str,
        values: &[QueryValue],
    ) -> Result<Fetched<Vec<Record>>, DaoError> {
        let result = self.query_on(role, sql, values).await?;
        Ok(Fetched {
            data: self.normalizer.normalize_many(result.rows),
            fields: result.fields,
            query: result.query,
        })
    }

    /// `INSERT INTO table SET record` on the master role. SQLite clusters get the
    /// equivalent column list and `VALUES` tuple.
    pub async fn insert(&self, table: &str, record: Record) -> WriteOutcome {
        self.insert_on(&self.master_role(), table, record).await
    }

    pub async fn insert_on(&self, role: &str, table: &str, record: Record) -> WriteOutcome {
        let (sql, values) = match self.cluster.dialect() {
            Dialect::MySql => (
                "INSERT INTO ?? SET ?",
                vec![QueryValue::ident(table), QueryValue::Record(record)],
            ),
            Dialect::Sqlite => {
                let (columns, row): (Vec<RowValues>, Vec<RowValues>) = record
                    .iter()
                    .map(|(column, v)| (RowValues::Text(column.clone()), RowValues::from(v)))
                    .unzip();
                (
                    "INSERT INTO ?? (??) VALUES (?)",
                    vec![
                        QueryValue::ident(table),
                        QueryValue::List(columns),
                        QueryValue::List(row),
                    ],
                )
            }
        };
        self.write(role, sql, &values).await
    }

    /// `UPDATE table SET record [WHERE ...]` on the master role. `values` bind the
    /// WHERE tokens and follow the SET values.
    pub async fn update(
        &self,
        table: &str,
        record: Record,
        where_clauses: impl Into<Where>,
        values: &[QueryValue],
    ) -> WriteOutcome {
        self.update_on(&self.master_role(), table, record, where_clauses, values)
            .await
    }

    pub async fn update_on(
        &self,
        role: &str,
        table: &str,
        record: Record,
        where_clauses: impl Into<Where>,
        values: &[QueryValue],
    ) -> WriteOutcome {
        let sql = with_where("UPDATE ?? SET ?", &where_clauses.into());
        let mut all = Vec::with_capacity(values.len() + 2);
        all.push(QueryValue::ident(table));
        all.push(QueryValue::Record(record));
        all.extend_from_slice(values);
        self.write(role, &sql, &all).await
    }

    /// `DELETE FROM table [WHERE ...]` on the master role.
    pub async fn delete(
        &self,
        table: &str,
        where_clauses: impl Into<Where>,
        values: &[QueryValue],
    ) -> WriteOutcome {
        self.delete_on(&self.master_role(), table, where_clauses, values)
            .await
    }

    pub async fn delete_on(
        &self,
        role: &str,
        table: &str,
        where_clauses: impl Into<Where>,
        values: &[QueryValue],
    ) -> WriteOutcome {
        let sql = with_where("DELETE FROM ??", &where_clauses.into());
        let mut all = Vec::with_capacity(values.len() + 1);
        all.push(QueryValue::ident(table));
        all.extend_from_slice(values);
        self.write(role, &sql, &all).await
    }

    async fn write(&self, role: &str, sql: &str, values: &[QueryValue]) -> WriteOutcome {
        match self.query_on(role, sql, values).await {
            Ok(result) => WriteOutcome::ok(result.summary),
            Err(e) => WriteOutcome::failed(e),
        }
    }

    /// Inline `values` into `sql` for diagnostics.
    ///
    /// # Errors
    /// Returns `DaoError::ParameterError` when tokens and values do not line up.
    pub fn format(&self, sql: &str, values: &[QueryValue]) -> Result<String, DaoError> {
        template::format_with(self.cluster.dialect(), sql, values)
    }
}

fn with_where(base: &str, where_clauses: &Where) -> String {
    match where_clauses.render() {
        Some(clause) => format!("{base} WHERE {clause}"),
        None => base.to_string(),
    }
}
