//! Convenient imports for common functionality.

pub use crate::cluster::{Cluster, ClusterConnection, Dialect, Selector};
pub use crate::error::DaoError;
pub use crate::normalizer::{Normalized, RecordNormalizer, merge_nested, split_nested, unix_now};
pub use crate::results::{FieldInfo, Fetched, QueryHandle, QueryResult, ResultSet, WriteOutcome};
pub use crate::router::{Db, RoleConfig, Where};
pub use crate::sql_builder::{
    Limit, SelectBuilder, SortSpec, build_select_ordered, build_select_paged, limit_clause,
    offset_clause, order_by, push_where, push_where_with, render_field_list,
};
pub use crate::types::{QueryValue, Record, RowValues, WriteResult};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{ClusterOptions, ClusterOptionsBuilder, SqliteCluster};
