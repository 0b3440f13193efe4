//! Integration tests against a live PostgreSQL server.
//!
//! Run with: cargo test --features postgres-tests
//!
//! The server is taken from `DATABASE_URL`, falling back to
//! `host=localhost user=postgres dbname=postgres`.

#![cfg(feature = "postgres-tests")]

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

use pqbind::db::{
    oid, CellValue, Connection, DbError, DiagnosticAccessors, FieldFormat, Param, PgClient,
    ResultErrorKind, StatusCode, Value,
};

/// Test connection string for PostgreSQL (local instance)
const PG_CONNECTION: &str = "host=localhost user=postgres dbname=postgres";

fn connect() -> Connection<PgClient> {
    let conninfo = std::env::var("DATABASE_URL").unwrap_or_else(|_| PG_CONNECTION.to_string());
    Connection::connect(&conninfo).expect("PostgreSQL should be reachable")
}

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

#[test]
fn test_simple_query_materializes_text_rows() {
    let conn = connect();
    let result = conn
        .exec("SELECT * FROM (VALUES ('1', 'alice'), ('2', 'bob')) AS t(id, name)", &[])
        .unwrap();

    assert_eq!(result.status(), StatusCode::TuplesOk);
    assert_eq!(result.column_names(), vec!["id", "name"]);
    assert_eq!(
        result.rows(),
        vec![vec![text("1"), text("alice")], vec![text("2"), text("bob")]]
    );
    assert_eq!(result.named_rows()[1].get("name"), Some(&text("bob")));
    conn.close();
}

#[test]
fn test_simple_query_keeps_null_distinct() {
    let conn = connect();
    let result = conn.exec("SELECT NULL AS a, '' AS b", &[]).unwrap();
    assert!(result.is_null(0, 0));
    assert_eq!(result.value(0, 1), Some(&text("")));
    conn.close();
}

#[test]
fn test_command_without_rows() {
    let conn = connect();
    let result = conn.exec("SET application_name = 'pqbind'", &[]).unwrap();
    assert_eq!(result.status(), StatusCode::CommandOk);
    assert_eq!(result.field_count(), 0);
    conn.close();
}

#[test]
fn test_empty_query() {
    let conn = connect();
    let err = conn.exec("   ", &[]).unwrap_err();
    assert_eq!(
        err.as_result_error().map(|e| e.kind()),
        Some(ResultErrorKind::EmptyQuery)
    );
    conn.close();
}

#[test]
fn test_syntax_error_carries_diagnostics() {
    let conn = connect();
    let err = conn.exec("SELEC 1", &[]).unwrap_err();
    let result_error = err.as_result_error().expect("Expected a result error");

    assert_eq!(result_error.kind(), ResultErrorKind::Fatal);
    assert_eq!(result_error.sqlstate(), Some("42601"));
    assert_eq!(result_error.severity_nonlocalized(), Some("ERROR"));
    assert!(result_error.message().unwrap_or_default().contains("syntax error"));
    assert_eq!(result_error.statement_position(), Some("1"));
    conn.close();
}

#[test]
fn test_extended_query_with_params() {
    let conn = connect();
    let result = conn
        .exec(
            "SELECT $1::int4 + 1 AS n, $2::text AS label",
            &[Param::Int(41), Param::from("x")],
        )
        .unwrap();

    assert_eq!(result.field_type(0).unwrap(), oid::INT4);
    assert_eq!(result.field_format(0).unwrap(), FieldFormat::Binary);
    assert_eq!(result.value(0, 0), Some(&CellValue::Binary(42i32.to_be_bytes().to_vec())));
    assert_eq!(result.decode(0, 0).unwrap(), Value::Int(42));
    assert_eq!(result.decode(0, 1).unwrap(), Value::Text("x".to_string()));
    conn.close();
}

#[test]
fn test_prepare_exec_and_describe() {
    let conn = connect();
    let statement = conn
        .prepare("pqbind_it", "SELECT $1::int8 AS id, $2::text AS name")
        .unwrap();

    let described = statement.describe().unwrap();
    assert_eq!(described.param_count(), 2);
    assert_eq!(described.param_type(0).unwrap(), oid::INT8);
    assert_eq!(described.param_type(1).unwrap(), oid::TEXT);
    assert_eq!(described.column_names(), vec!["id", "name"]);
    assert_eq!(described.row_count(), 0);

    let result = statement.exec(&[Param::Int(7), Param::from("seven")]).unwrap();
    assert_eq!(result.row_count(), 1);
    conn.close();
}

#[test]
fn test_duplicate_prepare_fails() {
    let conn = connect();
    conn.prepare("pqbind_dup", "SELECT 1").unwrap();
    let err = conn.prepare("pqbind_dup", "SELECT 2").unwrap_err();
    assert_eq!(err.sqlstate(), Some("42P05"));
    conn.close();
}

#[test]
fn test_unknown_statement_fails() {
    let conn = connect();
    let err = conn.exec_prepared("pqbind_missing", &[]).unwrap_err();
    assert_eq!(err.sqlstate(), Some("26000"));
    conn.close();
}

#[test]
fn test_reset_drops_prepared_statements() {
    let conn = connect();
    conn.prepare("pqbind_reset", "SELECT 1").unwrap();
    conn.reset().unwrap();
    let err = conn.exec_prepared("pqbind_reset", &[]).unwrap_err();
    assert_eq!(err.sqlstate(), Some("26000"));
    conn.close();
}

#[test]
fn test_closed_connection() {
    let conn = connect();
    let statement = conn.prepare("pqbind_closed", "SELECT 1").unwrap();
    conn.close();
    conn.close();
    assert!(matches!(statement.exec(&[]), Err(DbError::ConnectionClosed)));
    assert!(matches!(conn.exec("SELECT 1", &[]), Err(DbError::ConnectionClosed)));
}

#[test]
fn test_exec_each_streams_rows_and_stops_early() {
    let conn = connect();
    let mut seen = Vec::new();
    conn.exec_each(
        "SELECT n FROM generate_series(1, $1::int4) AS n",
        &[Param::Int(1000)],
        |result| {
            assert_eq!(result.status(), StatusCode::SingleTuple);
            seen.push(result.decode(0, 0).unwrap());
            if seen.len() == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        },
    )
    .unwrap();
    assert_eq!(seen, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);

    // the rest of the stream was discarded
    let result = conn.exec("SELECT 1 AS one", &[]).unwrap();
    assert_eq!(result.rows(), vec![vec![text("1")]]);
    conn.close();
}

#[test]
fn test_exec_prepared_each_reports_failure() {
    let conn = connect();
    conn.prepare("pqbind_each", "SELECT 1 / $1::int4 AS q").unwrap();
    let err = conn
        .exec_prepared_each("pqbind_each", &[Param::Int(0)], |_| ControlFlow::Continue(()))
        .unwrap_err();
    assert_eq!(err.sqlstate(), Some("22012"));
    conn.close();
}

#[test]
fn test_notice_receiver_gets_server_notices() {
    let conn = connect();
    let notices = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notices);
    conn.set_notice_receiver(move |notice| {
        assert_eq!(notice.kind(), ResultErrorKind::NonFatal);
        sink.lock().unwrap().push(notice.message().unwrap_or_default().to_string());
    })
    .unwrap();

    conn.exec("DO $$ BEGIN RAISE NOTICE 'hello from pqbind'; END $$", &[])
        .unwrap();
    assert_eq!(*notices.lock().unwrap(), vec!["hello from pqbind"]);

    // the receiver survives a reset
    conn.reset().unwrap();
    conn.exec("DO $$ BEGIN RAISE WARNING 'after reset'; END $$", &[])
        .unwrap();
    assert_eq!(notices.lock().unwrap().len(), 2);
    conn.close();
}
