//! Execution gateway over the SQLite store.

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{Counting, Fixture, Flaky};
use dashq::compose::ComposedQuery;
use dashq::gateway::{
    ExecutionErrorKind, ExecutionGateway, GatewayOptions, QueryRequest, SqliteStore,
    StorageEngine, StoreOptions,
};
use dashq::sql::SqlValue;
use dashq::template::{QueryTemplate, ResultColumn, SemanticType};
use dashq::Cell;

/// Counts to a hundred million; only a timeout stops it early.
const RUNAWAY: &str = "WITH RECURSIVE cnt(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM cnt WHERE x < 100000000) SELECT COUNT(*) AS n FROM cnt";

fn options() -> GatewayOptions {
    GatewayOptions {
        statement_timeout: Duration::from_secs(5),
        retry_backoff: Duration::from_millis(1),
    }
}

fn count_query(statement: &str, parameters: Vec<SqlValue>) -> ComposedQuery {
    ComposedQuery {
        statement_text: statement.to_string(),
        parameters,
        source_template: Arc::new(
            QueryTemplate::new("count", "sales", "SELECT COUNT(*) AS n FROM sales")
                .column("n", SemanticType::Integer),
        ),
    }
}

#[test]
fn test_binds_parameters_in_order() {
    let fixture = Fixture::new();
    let gateway = ExecutionGateway::new(fixture.store(), options());

    let result = gateway
        .execute(count_query(
            "SELECT COUNT(*) AS n FROM sales WHERE region IN (?1, ?2) AND date(order_date) >= ?3",
            vec![
                SqlValue::text("West"),
                SqlValue::text("East"),
                SqlValue::Date(common::date(2016, 1, 1)),
            ],
        ))
        .unwrap();
    let expected = fixture.scalar(
        "SELECT COUNT(*) FROM sales WHERE region IN ('West', 'East') AND order_date >= '2016-01-01'",
    );
    assert_eq!(result.rows, vec![vec![Cell::Integer(expected as i64)]]);
}

#[test]
fn test_refuses_writes() {
    let fixture = Fixture::new();
    let gateway = ExecutionGateway::new(fixture.store(), options());

    for statement in [
        "DELETE FROM sales",
        "UPDATE sales SET sales = 0",
        "DROP TABLE sales",
    ] {
        let err = gateway.execute(count_query(statement, vec![])).unwrap_err();
        assert_eq!(err.kind(), ExecutionErrorKind::MalformedStatement, "{}", statement);
    }
    assert_eq!(fixture.scalar("SELECT COUNT(*) FROM sales"), common::ROWS as f64);
}

#[test]
fn test_shape_mismatch_is_malformed() {
    let fixture = Fixture::new();
    let gateway = ExecutionGateway::new(fixture.store(), options());

    let err = gateway
        .execute(count_query("SELECT COUNT(*) AS n, 1 AS extra FROM sales", vec![]))
        .unwrap_err();
    assert_eq!(err.kind(), ExecutionErrorKind::MalformedStatement);

    let err = gateway
        .execute(count_query("SELECT COUNT(*) AS total FROM sales", vec![]))
        .unwrap_err();
    assert_eq!(err.kind(), ExecutionErrorKind::MalformedStatement);
}

#[test]
fn test_type_mismatch_is_malformed() {
    let fixture = Fixture::new();
    let gateway = ExecutionGateway::new(fixture.store(), options());

    let err = gateway
        .execute(count_query("SELECT region AS n FROM sales", vec![]))
        .unwrap_err();
    assert_eq!(err.kind(), ExecutionErrorKind::MalformedStatement);
    assert!(err.message().contains("'n'"), "{}", err);
}

#[test]
fn test_syntax_error_is_malformed_and_not_retried() {
    let fixture = Fixture::new();
    let (store, calls) = Counting::new(fixture.store());
    let gateway = ExecutionGateway::new(store, options());

    let err = gateway
        .execute(count_query("SELEC COUNT(*) AS n FORM sales", vec![]))
        .unwrap_err();
    assert_eq!(err.kind(), ExecutionErrorKind::MalformedStatement);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_runaway_statement_times_out() {
    let fixture = Fixture::new();
    let (store, calls) = Counting::new(fixture.store());
    let gateway = ExecutionGateway::new(
        store,
        GatewayOptions {
            statement_timeout: Duration::from_millis(50),
            retry_backoff: Duration::from_millis(1),
        },
    );

    let started = Instant::now();
    let err = gateway.execute(count_query(RUNAWAY, vec![])).unwrap_err();
    assert_eq!(err.kind(), ExecutionErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_store_is_usable_after_timeout() {
    let fixture = Fixture::new();
    let store = SqliteStore::open(
        &fixture.uri,
        StoreOptions {
            pool_size: 1,
            checkout_timeout: Duration::from_secs(1),
        },
    )
    .unwrap();
    let columns = [ResultColumn::new("n", SemanticType::Integer)];

    let err = store
        .query(&QueryRequest {
            statement: RUNAWAY,
            parameters: &[],
            columns: &columns,
            timeout: Duration::from_millis(20),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ExecutionErrorKind::Timeout);

    let result = store
        .query(&QueryRequest {
            statement: "SELECT COUNT(*) AS n FROM sales",
            parameters: &[],
            columns: &columns,
            timeout: Duration::from_secs(5),
        })
        .unwrap();
    assert_eq!(result.rows[0][0], Cell::Integer(common::ROWS as i64));

    let state = store.pool_state();
    assert_eq!(state.connections, 1);
    assert_eq!(state.idle_connections, 1);
}

#[test]
fn test_unknown_quoted_column_is_malformed() {
    let fixture = Fixture::new();
    let gateway = ExecutionGateway::new(fixture.store(), options());

    for statement in [
        "SELECT COUNT(*) AS n FROM sales WHERE \"regoin\" IN (?1)",
        "SELECT COUNT(*) AS n FROM sales WHERE date(\"order_dat\") >= ?1",
    ] {
        let err = gateway
            .execute(count_query(statement, vec![SqlValue::text("West")]))
            .unwrap_err();
        assert_eq!(err.kind(), ExecutionErrorKind::MalformedStatement, "{}", statement);
        assert!(err.message().contains("no such column"), "{}", err);
    }
}

#[test]
fn test_lost_connection_retried_once() {
    let fixture = Fixture::new();
    let (store, calls) = Counting::new(Flaky::new(fixture.store(), 1));
    let gateway = ExecutionGateway::new(store, options());

    let result = gateway
        .execute(count_query("SELECT COUNT(*) AS n FROM sales", vec![]))
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_second_loss_is_reported() {
    let fixture = Fixture::new();
    let (store, calls) = Counting::new(Flaky::new(fixture.store(), 2));
    let gateway = ExecutionGateway::new(store, options());

    let err = gateway
        .execute(count_query("SELECT COUNT(*) AS n FROM sales", vec![]))
        .unwrap_err();
    assert_eq!(err.kind(), ExecutionErrorKind::ConnectionLost);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_missing_database_file() {
    let store = SqliteStore::open(
        "/definitely/not/here/superstore.db",
        StoreOptions {
            pool_size: 1,
            checkout_timeout: Duration::from_millis(200),
        },
    );
    match store {
        Err(err) => assert_eq!(err.kind(), ExecutionErrorKind::ConnectionLost),
        Ok(store) => {
            let columns = [ResultColumn::new("n", SemanticType::Integer)];
            let err = store
                .query(&QueryRequest {
                    statement: "SELECT 1 AS n",
                    parameters: &[],
                    columns: &columns,
                    timeout: Duration::from_secs(1),
                })
                .unwrap_err();
            assert_eq!(err.kind(), ExecutionErrorKind::ConnectionLost);
        }
    }
}
