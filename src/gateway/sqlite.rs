//! SQLite storage engine.
//!
//! Connections come from an `r2d2` pool. Each one is opened with URI
//! support and switched to `PRAGMA query_only`, so nothing run through the
//! store can write. Statements that SQLite itself reports as writing are
//! refused before they run.
//!
//! Double-quoted string literals are disabled on every connection: a quoted
//! identifier that names no column is an error, never the text of its name.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use rusqlite::config::DbConfig;
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags};
use tracing::debug;

use super::{ExecutionError, ExecutionErrorKind, ExecutionResult, QueryRequest, StorageEngine};
use crate::result::{Cell, TabularResult};
use crate::template::{ResultColumn, SemanticType};

/// Virtual machine steps between timeout checks.
const PROGRESS_STEPS: i32 = 1_000;

/// Pool sizing for [`SqliteStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub pool_size: u32,
    pub checkout_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            pool_size: 4,
            checkout_timeout: Duration::from_secs(5),
        }
    }
}

/// Pooled, query-only SQLite store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open a pool over `path`. `path` may be a `file:` URI, e.g.
    /// `file:dash?mode=memory&cache=shared`.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> ExecutionResult<Self> {
        let path = path.as_ref();
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_init(|conn| {
                conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DML, false)?;
                conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DDL, false)?;
                conn.execute_batch("PRAGMA query_only = ON;")
            });

        let pool = Pool::builder()
            .max_size(options.pool_size.max(1))
            .connection_timeout(options.checkout_timeout)
            .build(manager)
            .map_err(|e| {
                ExecutionError::connection_lost(format!(
                    "failed to open database {}",
                    path.display()
                ))
                .with_source(e)
            })?;

        debug!(path = %path.display(), pool_size = options.pool_size, "opened sqlite store");
        Ok(Self { pool })
    }

    /// Connections currently open and idle in the pool.
    pub fn pool_state(&self) -> r2d2::State {
        self.pool.state()
    }
}

impl StorageEngine for SqliteStore {
    fn query(&self, request: &QueryRequest<'_>) -> ExecutionResult<TabularResult> {
        let conn = self.pool.get().map_err(|e| {
            ExecutionError::connection_lost("connection checkout failed").with_source(e)
        })?;

        let started = Instant::now();
        let timeout = request.timeout;
        conn.progress_handler(PROGRESS_STEPS, Some(move || started.elapsed() > timeout));
        let result = run(&conn, request);
        conn.progress_handler(PROGRESS_STEPS, None::<fn() -> bool>);

        result.map_err(|e| {
            if e.kind() == ExecutionErrorKind::Timeout {
                ExecutionError::timeout(format!(
                    "statement interrupted after {} ms",
                    started.elapsed().as_millis()
                ))
            } else {
                e
            }
        })
    }
}

fn run(conn: &Connection, request: &QueryRequest<'_>) -> ExecutionResult<TabularResult> {
    let mut stmt = conn.prepare(request.statement).map_err(classify)?;
    if !stmt.readonly() {
        return Err(ExecutionError::malformed("statement would modify the database"));
    }
    check_shape(&stmt.column_names(), request.columns)?;

    let mut result = TabularResult::new(request.columns.to_vec());
    let mut rows = stmt
        .query(params_from_iter(request.parameters.iter()))
        .map_err(classify)?;
    while let Some(row) = rows.next().map_err(classify)? {
        let mut cells = Vec::with_capacity(request.columns.len());
        for (index, column) in request.columns.iter().enumerate() {
            let value = row.get_ref(index).map_err(classify)?;
            cells.push(read_cell(value, column)?);
        }
        result.rows.push(cells);
    }
    Ok(result)
}

fn check_shape(names: &[&str], columns: &[ResultColumn]) -> ExecutionResult<()> {
    if names.len() != columns.len() {
        return Err(ExecutionError::malformed(format!(
            "statement returns {} columns, template declares {}",
            names.len(),
            columns.len()
        )));
    }
    for (name, column) in names.iter().zip(columns) {
        if !name.eq_ignore_ascii_case(&column.name) {
            return Err(ExecutionError::malformed(format!(
                "statement returns column '{}' where '{}' is declared",
                name, column.name
            )));
        }
    }
    Ok(())
}

/// Map a driver error onto the gateway's failure classes.
pub(crate) fn classify(err: rusqlite::Error) -> ExecutionError {
    let code = match &err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.code),
        _ => None,
    };
    let base = match code {
        Some(ErrorCode::OperationInterrupted) => ExecutionError::timeout("statement interrupted"),
        Some(
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::CannotOpen,
        ) => ExecutionError::connection_lost(err.to_string()),
        _ => ExecutionError::malformed(err.to_string()),
    };
    base.with_source(err)
}

/// Read one value as the column's semantic type. `NULL` fits every type.
pub(crate) fn read_cell(value: ValueRef<'_>, column: &ResultColumn) -> ExecutionResult<Cell> {
    let cell = match (column.semantic_type, value) {
        (_, ValueRef::Null) => Some(Cell::Null),

        (SemanticType::Text, ValueRef::Text(t)) => {
            Some(Cell::Text(String::from_utf8_lossy(t).into_owned()))
        }
        (SemanticType::Text, ValueRef::Integer(i)) => Some(Cell::Text(i.to_string())),
        (SemanticType::Text, ValueRef::Real(r)) => Some(Cell::Text(r.to_string())),

        (SemanticType::Integer, ValueRef::Integer(i)) => Some(Cell::Integer(i)),
        (SemanticType::Integer, ValueRef::Real(r))
            if r.fract() == 0.0 && r >= i64::MIN as f64 && r <= i64::MAX as f64 =>
        {
            Some(Cell::Integer(r as i64))
        }

        (SemanticType::Decimal, ValueRef::Integer(i)) => Some(Cell::Decimal(i as f64)),
        (SemanticType::Decimal, ValueRef::Real(r)) => Some(Cell::Decimal(r)),

        (SemanticType::Percentage, ValueRef::Integer(i)) => Some(Cell::Percentage(i as f64)),
        (SemanticType::Percentage, ValueRef::Real(r)) => Some(Cell::Percentage(r)),

        (SemanticType::Date, ValueRef::Text(t)) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.get(..10))
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(Cell::Date),

        _ => None,
    };

    cell.ok_or_else(|| {
        ExecutionError::malformed(format!(
            "column '{}' expects {}, got {}",
            column.name,
            column.semantic_type,
            value.data_type()
        ))
    })
}
