mod common;

use chrono::FixedOffset;
use cluster_dao::prelude::*;
use common::{ScriptedCluster, record};
use serde_json::json;

fn db() -> Db<ScriptedCluster> {
    let utc = FixedOffset::east_opt(0).unwrap();
    let normalizer = RecordNormalizer::default().with_utc_offset(utc);
    Db::with_normalizer(
        ScriptedCluster::new(&["master", "slave1", "slave2", "reports"]),
        normalizer,
    )
}

#[tokio::test]
async fn defaults_route_writes_to_master_and_reads_to_slaves() -> Result<(), DaoError> {
    let db = db();

    db.query("SELECT 1", &[]).await?;
    assert_eq!(db.cluster().last_call().node, "master");

    db.fetch_all("SELECT 1", &[]).await?;
    assert_eq!(db.cluster().last_call().node, "slave1");
    db.fetch_one("SELECT 1", &[]).await?;
    assert_eq!(db.cluster().last_call().node, "slave1");
    db.fetch_scalar_field("SELECT 1", &[], "x").await?;
    assert_eq!(db.cluster().last_call().node, "slave1");

    db.insert("t", record(json!({"a": 1}))).await.into_result()?;
    assert_eq!(db.cluster().last_call().node, "master");
    db.slave("SELECT 2", &[]).await?;
    assert_eq!(db.cluster().last_call().node, "slave1");
    db.master("SELECT 3", &[]).await?;
    assert_eq!(db.cluster().last_call().node, "master");
    Ok(())
}

#[tokio::test]
async fn explicit_roles_and_role_setters() -> Result<(), DaoError> {
    let db = db();

    db.fetch_all_on("reports", "SELECT 1", &[]).await?;
    assert_eq!(db.cluster().last_call().node, "reports");

    db.set_slave_role("slave2");
    db.set_master_role("reports");
    assert_eq!(
        db.roles(),
        RoleConfig {
            master: "reports".into(),
            slave: "slave2".into()
        }
    );

    db.fetch_one("SELECT 1", &[]).await?;
    assert_eq!(db.cluster().last_call().node, "slave2");
    let outcome = db.delete("t", Where::none(), &[]).await;
    assert!(outcome.is_ok());
    assert_eq!(db.cluster().last_call().node, "reports");

    db.master("SELECT 3", &[]).await?;
    assert_eq!(db.cluster().last_call().node, "reports");
    db.slave("SELECT 4", &[]).await?;
    assert_eq!(db.cluster().last_call().node, "slave2");
    Ok(())
}

#[tokio::test]
async fn fetch_one_distinguishes_no_row_from_empty_list() -> Result<(), DaoError> {
    let db = db();

    db.cluster().push_rows(&["id"], vec![]);
    let one = db.fetch_one("SELECT id FROM t WHERE id = ?", &[5.into()]).await?;
    assert!(one.data.is_none());

    db.cluster().push_rows(&["id"], vec![]);
    let all = db.fetch_all("SELECT id FROM t", &[]).await?;
    assert!(all.data.is_empty());

    db.cluster().push_rows(&["id"], vec![]);
    let scalar = db.fetch_scalar_field("SELECT id FROM t", &[], "id").await?;
    assert!(scalar.data.is_none());
    Ok(())
}

#[tokio::test]
async fn fetches_normalize_rows() -> Result<(), DaoError> {
    let db = db();

    db.cluster().push_rows(
        &["id", "name", "ctime"],
        vec![
            vec![RowValues::Int(1), RowValues::Text("ann".into()), RowValues::Int(0)],
            vec![RowValues::Int(2), RowValues::Text("bob".into()), RowValues::Int(60)],
        ],
    );
    let fetched = db.fetch_all("SELECT id, name, ctime FROM users", &[]).await?;
    assert_eq!(fetched.fields.len(), 3);
    assert_eq!(
        fetched.data,
        vec![
            record(json!({"id": 1, "name": "ann", "ctime": "1970-01-01T00:00:00+00:00"})),
            record(json!({"id": 2, "name": "bob", "ctime": "1970-01-01T00:01:00+00:00"})),
        ]
    );

    db.cluster().push_rows(
        &["total"],
        vec![vec![RowValues::Int(7)], vec![RowValues::Int(9)]],
    );
    let total = db
        .fetch_scalar_field("SELECT COUNT(*) AS total FROM users", &[], "total")
        .await?;
    assert_eq!(total.data, Some(json!(7)));
    Ok(())
}

#[tokio::test]
async fn read_failures_carry_sql_and_values() {
    let db = db();
    db.cluster()
        .push(Err(DaoError::ExecutionError("disk on fire".into())));

    let err = db
        .fetch_one("SELECT * FROM ?? WHERE id = ?", &[QueryValue::ident("users"), 3.into()])
        .await
        .unwrap_err();
    match &err {
        DaoError::QueryFailed { sql, values, source } => {
            assert_eq!(sql, "SELECT * FROM ?? WHERE id = ?");
            assert_eq!(values, &vec![QueryValue::ident("users"), QueryValue::from(3)]);
            assert!(matches!(**source, DaoError::ExecutionError(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(db.cluster().checked_out(), 0);
}

#[tokio::test]
async fn unknown_role_is_a_query_failure() {
    let db = db();
    let err = db.query_on("replica*", "SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err.root_cause(), DaoError::PoolNotFound(role) if role == "replica*"));
    assert!(db.cluster().calls().is_empty());
}

#[tokio::test]
async fn write_failures_return_zeroed_results() {
    let db = db();
    for _ in 0..3 {
        db.cluster()
            .push(Err(DaoError::ExecutionError("constraint failed".into())));
    }

    let inserted = db.insert("users", record(json!({"name": "ann"}))).await;
    let updated = db
        .update("users", record(json!({"name": "bob"})), "id = ?", &[1.into()])
        .await;
    let deleted = db.delete("users", "id = ?", &[1.into()]).await;

    for outcome in [inserted, updated, deleted] {
        assert!(matches!(outcome.error, Some(DaoError::QueryFailed { .. })));
        assert_eq!(
            outcome.result,
            WriteResult {
                insert_id: 0,
                affected_rows: 0,
                changed_rows: 0
            }
        );
    }
    assert_eq!(db.cluster().checked_out(), 0);
}

#[tokio::test]
async fn update_binds_set_values_before_where_values() -> Result<(), DaoError> {
    let db = db();
    let mut clauses = Vec::new();
    push_where(&mut clauses, "id = ?");
    push_where_with(&mut clauses, "owner = ?", "OR");

    db.cluster().push(Ok(ResultSet::from_write(WriteResult {
        insert_id: 0,
        affected_rows: 2,
        changed_rows: 1,
    })));
    let result = db
        .update(
            "posts",
            record(json!({"title": "x", "draft": false})),
            clauses,
            &[10.into(), "ann".into()],
        )
        .await
        .into_result()?;
    assert_eq!(result.affected_rows, 2);
    assert_eq!(result.changed_rows, 1);

    let call = db.cluster().last_call();
    assert_eq!(
        call.sql,
        "UPDATE `posts` SET `draft` = ?, `title` = ? WHERE id = ? OR owner = ?"
    );
    assert_eq!(
        call.params,
        vec![
            RowValues::Bool(false),
            RowValues::Text("x".into()),
            RowValues::Int(10),
            RowValues::Text("ann".into()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn insert_and_delete_statements() -> Result<(), DaoError> {
    let db = db();

    db.insert("users", record(json!({"name": "ann", "age": 3})))
        .await
        .into_result()?;
    let call = db.cluster().last_call();
    assert_eq!(call.sql, "INSERT INTO `users` SET `age` = ?, `name` = ?");
    assert_eq!(call.params, vec![RowValues::Int(3), RowValues::Text("ann".into())]);

    db.delete("users", Where::none(), &[]).await.into_result()?;
    assert_eq!(db.cluster().last_call().sql, "DELETE FROM `users`");

    db.delete("users", ["id > ?", "AND id < ?"], &[1.into(), 9.into()])
        .await
        .into_result()?;
    let call = db.cluster().last_call();
    assert_eq!(call.sql, "DELETE FROM `users` WHERE id > ? AND id < ?");
    assert_eq!(call.params, vec![RowValues::Int(1), RowValues::Int(9)]);
    Ok(())
}

#[tokio::test]
async fn query_handle_reports_expanded_statement() -> Result<(), DaoError> {
    let db = db();
    let result = db
        .query(
            "SELECT * FROM ?? WHERE id IN (?)",
            &[
                QueryValue::ident("users"),
                QueryValue::List(vec![RowValues::Int(1), RowValues::Int(2)]),
            ],
        )
        .await?;
    assert_eq!(result.query.sql, "SELECT * FROM `users` WHERE id IN (?, ?)");
    assert_eq!(result.query.values, vec![RowValues::Int(1), RowValues::Int(2)]);
    assert_eq!(
        db.format("SELECT * FROM ?? WHERE id = ?", &[QueryValue::ident("users"), 4.into()])?,
        "SELECT * FROM `users` WHERE id = 4"
    );
    Ok(())
}
