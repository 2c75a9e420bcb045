//! Role-routed data access over clustered SQL pools.
//!
//! - [`sql_builder`] assembles `SELECT` statements, where/order/limit fragments and
//!   projection lists.
//! - [`Db`] sends each statement to the pool group named by a role token (`master` for
//!   writes, `slave*` for reads by default) and shapes the rows.
//! - [`normalizer`] turns flat, prefixed rows into application records.
//!
//! The pool client sits behind the [`cluster::Cluster`] trait; with the `sqlite`
//! feature (on by default) [`sqlite::SqliteCluster`] provides one.
//!
//! ```rust,no_run
//! use cluster_dao::prelude::*;
//! use serde_json::json;
//!
//! # #[cfg(feature = "sqlite")]
//! # async fn demo() -> Result<(), DaoError> {
//! let cluster = SqliteCluster::builder()
//!     .node("master", "app.db")
//!     .node("slave1", "app.db")
//!     .build()
//!     .await?;
//! let db = Db::new(cluster);
//!
//! let mut user = Record::new();
//! user.insert("name".into(), json!("ann"));
//! user.insert("ctime".into(), json!(unix_now()));
//! let id = db.insert("users", user).await.into_result()?.insert_id;
//!
//! let found = db
//!     .fetch_one("SELECT * FROM users WHERE id = ?", &[id.into()])
//!     .await?
//!     .into_data();
//! # let _ = found;
//! # Ok(()) }
//! ```

pub mod cluster;
pub mod error;
pub mod normalizer;
pub mod prelude;
pub mod results;
pub mod router;
pub mod sql_builder;
pub mod template;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::DaoError;
pub use router::{Db, RoleConfig, Where};
