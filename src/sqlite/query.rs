use rusqlite::types::Value;
use rusqlite::{Statement, ToSql};

use crate::error::DaoError;
use crate::results::{FieldInfo, ResultSet};
use crate::types::WriteResult;

use super::params::sqlite_value_to_row_value;

/// Materialize every row of a prepared statement.
///
/// # Errors
/// Returns `DaoError::SqliteError` if stepping the statement or reading a column fails.
pub fn build_result_set(stmt: &mut Statement, params: &[Value]) -> Result<ResultSet, DaoError> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let fields: Vec<FieldInfo> = stmt
        .columns()
        .iter()
        .map(|column| FieldInfo::new(column.name()).with_decl_type(column.decl_type()))
        .collect();
    let col_count = fields.len();

    let mut result_set = ResultSet::with_fields(fields, 10);
    let mut rows_iter = stmt.query(&param_refs[..])?;
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let value: Value = row.get(i)?;
            row_values.push(sqlite_value_to_row_value(value));
        }
        result_set.add_row_values(row_values);
    }
    result_set.summary.affected_rows = result_set.rows.len();
    Ok(result_set)
}

/// Run one statement: row-returning statements are materialized, everything else
/// reports a [`WriteResult`].
///
/// # Errors
/// Returns `DaoError::SqliteError` on prepare or execution failure.
pub fn run_statement(
    conn: &mut rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> Result<ResultSet, DaoError> {
    let mut stmt = conn.prepare(sql)?;
    if stmt.column_count() > 0 {
        return build_result_set(&mut stmt, params);
    }

    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let affected_rows = stmt.execute(&param_refs[..])?;
    drop(stmt);

    let kind = StatementKind::of(sql);
    let insert_id = if kind == StatementKind::Insert {
        conn.last_insert_rowid()
    } else {
        0
    };
    let changed_rows = if kind == StatementKind::Update {
        affected_rows
    } else {
        0
    };
    Ok(ResultSet::from_write(WriteResult {
        insert_id,
        affected_rows,
        changed_rows,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    Insert,
    Update,
    Other,
}

impl StatementKind {
    fn of(sql: &str) -> Self {
        match sql.split_whitespace().next() {
            Some(word)
                if word.eq_ignore_ascii_case("INSERT") || word.eq_ignore_ascii_case("REPLACE") =>
            {
                StatementKind::Insert
            }
            Some(word) if word.eq_ignore_ascii_case("UPDATE") => StatementKind::Update,
            _ => StatementKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        conn
    }

    #[test]
    fn writes_report_insert_id_and_changes() {
        let mut conn = conn();
        let res = run_statement(
            &mut conn,
            "INSERT INTO t (name) VALUES (?)",
            &[Value::Text("a".into())],
        )
        .unwrap();
        assert_eq!(res.summary.insert_id, 1);
        assert_eq!(res.summary.affected_rows, 1);
        assert_eq!(res.summary.changed_rows, 0);

        let res = run_statement(&mut conn, "update t SET name = 'b'", &[]).unwrap();
        assert_eq!(res.summary.insert_id, 0);
        assert_eq!(res.summary.changed_rows, 1);
    }

    #[test]
    fn selects_materialize_rows() {
        let mut conn = conn();
        run_statement(&mut conn, "INSERT INTO t (name) VALUES ('x'), (NULL)", &[]).unwrap();
        let res = run_statement(&mut conn, "SELECT id, name FROM t ORDER BY id", &[]).unwrap();
        assert_eq!(res.fields.len(), 2);
        assert_eq!(res.fields[0].decl_type.as_deref(), Some("INTEGER"));
        assert_eq!(res.fields[1].name, "name");
        assert_eq!(res.fields[1].decl_type.as_deref(), Some("TEXT"));

        let computed = run_statement(&mut conn, "SELECT COUNT(*) AS n FROM t", &[]).unwrap();
        assert_eq!(computed.fields[0].decl_type, None);
        assert_eq!(res.rows.len(), 2);
        assert_eq!(res.rows[0].get("name"), Some(&RowValues::Text("x".into())));
        assert_eq!(res.rows[1].get("name"), Some(&RowValues::Null));
    }

    #[test]
    fn bad_sql_is_an_error() {
        let mut conn = conn();
        assert!(matches!(
            run_statement(&mut conn, "SELEC nope", &[]),
            Err(DaoError::SqliteError(_))
        ));
    }
}
