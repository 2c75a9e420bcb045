//! SQL fragment builders.
//!
//! Everything here assembles trusted fragments (column lists, clauses the caller already
//! wrote with `?` tokens). Values go through [`crate::template`] at execution time; the
//! only identifier that can come from a request, the sort field, is checked against a
//! safelist and escaped.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DaoError;
use crate::template;
use crate::types::QueryValue;

/// Strip backticks and any `qualifier.` prefix: `` `u`.`name` `` → `name`.
#[must_use]
pub fn bare_name(field: &str) -> String {
    let unquoted = field.replace('`', "");
    match unquoted.rfind('.') {
        Some(idx) => unquoted[idx + 1..].to_string(),
        None => unquoted,
    }
}

/// Render a projection list.
///
/// With a `prefix`, each entry becomes `prefix + bare_name`; without one the field is
/// emitted as written. A non-empty `rename_as` appends `AS rename_as + bare_name`, which
/// is how joined entities get distinguishable column names.
///
/// ```rust
/// use cluster_dao::sql_builder::render_field_list;
///
/// assert_eq!(render_field_list("", "", &["u.id", "u.name"]), "u.id, u.name");
/// assert_eq!(
///     render_field_list("a.", "author_", &["id", "`name`"]),
///     "a.id AS author_id, a.name AS author_name"
/// );
/// ```
#[must_use]
pub fn render_field_list<S: AsRef<str>>(prefix: &str, rename_as: &str, fields: &[S]) -> String {
    fields
        .iter()
        .map(|field| {
            let field = field.as_ref();
            let name = bare_name(field);
            let mut out = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}{name}")
            };
            if !rename_as.is_empty() {
                out.push_str(" AS ");
                out.push_str(rename_as);
                out.push_str(&name);
            }
            out
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `LIMIT <offset>, <limit>`.
#[must_use]
pub fn limit_clause(limit: u64, offset: u64) -> String {
    format!("LIMIT {offset}, {limit}")
}

/// Limit clause for a 1-based `page`. Page 0 is treated as the first page.
#[must_use]
pub fn offset_clause(page: u64, limit: u64) -> String {
    limit_clause(limit, limit.saturating_mul(page.saturating_sub(1)))
}

/// Append `clause` to `clauses` joined by `AND`. Returns the new length.
pub fn push_where(clauses: &mut Vec<String>, clause: impl AsRef<str>) -> usize {
    push_where_with(clauses, clause, "AND")
}

/// Append `clause` prefixed by `operand` unless it is the first clause.
pub fn push_where_with(
    clauses: &mut Vec<String>,
    clause: impl AsRef<str>,
    operand: &str,
) -> usize {
    let clause = clause.as_ref();
    if clauses.is_empty() {
        clauses.push(clause.to_string());
    } else {
        clauses.push(format!("{operand} {clause}"));
    }
    clauses.len()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    /// Missing or empty means `DESC`; anything other than `desc` (any case) means `ASC`.
    #[must_use]
    pub fn from_param(dir: Option<&str>) -> Self {
        match dir {
            None | Some("") => SortDir::Desc,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDir::Desc,
            Some(_) => SortDir::Asc,
        }
    }
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDir::Asc => f.write_str("ASC"),
            SortDir::Desc => f.write_str("DESC"),
        }
    }
}

/// One requested sort key, typically deserialized from request input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub dir: Option<String>,
}

impl SortSpec {
    #[must_use]
    pub fn new(field: impl Into<String>, dir: Option<&str>) -> Self {
        Self {
            field: field.into(),
            dir: dir.map(str::to_string),
        }
    }
}

/// Build `ORDER BY` items from `sort`, keeping only fields listed in `allowed`.
///
/// The safelist is mandatory: sort fields usually come straight from a request, and
/// anything not listed is dropped without error.
#[must_use]
pub fn order_by<S: AsRef<str>>(sort: &[SortSpec], allowed: &[S]) -> Vec<String> {
    sort.iter()
        .filter(|spec| allowed.iter().any(|a| a.as_ref() == spec.field))
        .map(|spec| {
            format!(
                "{} {}",
                template::escape_id(&spec.field),
                SortDir::from_param(spec.dir.as_deref())
            )
        })
        .collect()
}

/// Row window: `LIMIT offset, limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub limit: u64,
    pub offset: u64,
}

impl Limit {
    #[must_use]
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Window for a 1-based page.
    #[must_use]
    pub fn page(page: u64, limit: u64) -> Self {
        Self {
            limit,
            offset: limit.saturating_mul(page.saturating_sub(1)),
        }
    }
}

/// Assembles `SELECT` statements from fragments.
///
/// Clause order is fixed: `WHERE`, `GROUP BY`, `ORDER BY`, `LIMIT`. Where clauses are
/// joined with a space (they carry their own operands, see [`push_where`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectBuilder {
    fields: Vec<String>,
    tables: Vec<String>,
    where_clauses: Vec<String>,
    group_by: Vec<String>,
    order: Vec<String>,
    limit: Option<Limit>,
}

impl SelectBuilder {
    #[must_use]
    pub fn new<F, T>(fields: &[F], tables: &[T]) -> Self
    where
        F: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            fields: to_owned(fields),
            tables: to_owned(tables),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn where_clauses<S: AsRef<str>>(mut self, clauses: &[S]) -> Self {
        self.where_clauses = to_owned(clauses);
        self
    }

    #[must_use]
    pub fn group_by<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.group_by = to_owned(columns);
        self
    }

    #[must_use]
    pub fn order_by<S: AsRef<str>>(mut self, order: &[S]) -> Self {
        self.order = to_owned(order);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn build(&self) -> String {
        let mut sql = vec![
            "SELECT".to_string(),
            self.fields.join(", "),
            "FROM".to_string(),
            self.tables.join(" "),
        ];
        if !self.where_clauses.is_empty() {
            sql.push("WHERE".to_string());
            sql.push(self.where_clauses.join(" "));
        }
        if !self.group_by.is_empty() {
            sql.push("GROUP BY".to_string());
            sql.push(self.group_by.join(", "));
        }
        if !self.order.is_empty() {
            sql.push("ORDER BY".to_string());
            sql.push(self.order.join(", "));
        }
        if let Some(Limit { limit, offset }) = self.limit {
            sql.push(limit_clause(limit, offset));
        }
        sql.join(" ")
    }
}

fn to_owned<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items.iter().map(|s| s.as_ref().to_string()).collect()
}

/// `SELECT` with an `ORDER BY` list and an optional row window.
#[must_use]
pub fn build_select_ordered(
    fields: &[&str],
    tables: &[&str],
    where_clauses: &[String],
    order: &[String],
    group_by: &[String],
    limit: Option<Limit>,
) -> String {
    let builder = SelectBuilder::new(fields, tables)
        .where_clauses(where_clauses)
        .group_by(group_by)
        .order_by(order);
    match limit {
        Some(limit) => builder.limit(limit).build(),
        None => builder.build(),
    }
}

/// `SELECT` without ordering, windowed by `limit` and `offset`.
#[must_use]
pub fn build_select_paged(
    fields: &[&str],
    tables: &[&str],
    where_clauses: &[String],
    group_by: &[String],
    limit: u64,
    offset: u64,
) -> String {
    SelectBuilder::new(fields, tables)
        .where_clauses(where_clauses)
        .group_by(group_by)
        .limit(Limit::new(limit, offset))
        .build()
}

/// Inline `values` into `sql` for logging or manual composition. Not used when
/// executing statements.
///
/// # Errors
/// Returns `DaoError::ParameterError` when tokens and values do not line up.
pub fn format(sql: &str, values: &[QueryValue]) -> Result<String, DaoError> {
    template::format(sql, values)
}
