//! Execution gateway.
//!
//! Runs a [`ComposedQuery`] against a [`StorageEngine`] and returns rows
//! typed per the template's result columns.
//!
//! # Failure handling
//!
//! | kind                 | cause                                   | retried |
//! |----------------------|-----------------------------------------|---------|
//! | `Timeout`            | statement exceeded its time budget      | no      |
//! | `ConnectionLost`     | busy/locked store, I/O, pool checkout   | once    |
//! | `MalformedStatement` | bad SQL, bad bindings, shape mismatch   | no      |

mod error;
mod sqlite;

pub use error::{ExecutionError, ExecutionErrorKind, ExecutionResult};
pub use sqlite::{SqliteStore, StoreOptions};

use std::time::Duration;

use tracing::{debug, warn};

use crate::compose::ComposedQuery;
use crate::result::TabularResult;
use crate::sql::SqlValue;
use crate::template::ResultColumn;

/// One statement to run, with everything the store needs to type its rows.
#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'a> {
    pub statement: &'a str,
    pub parameters: &'a [SqlValue],
    pub columns: &'a [ResultColumn],
    pub timeout: Duration,
}

/// A relational store that can run one read-only statement.
pub trait StorageEngine: Send + Sync {
    fn query(&self, request: &QueryRequest<'_>) -> ExecutionResult<TabularResult>;
}

impl<T: StorageEngine + ?Sized> StorageEngine for std::sync::Arc<T> {
    fn query(&self, request: &QueryRequest<'_>) -> ExecutionResult<TabularResult> {
        (**self).query(request)
    }
}

/// Timing knobs for the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayOptions {
    pub statement_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            statement_timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// Executes composed statements, retrying a lost connection once.
pub struct ExecutionGateway {
    engine: Box<dyn StorageEngine>,
    options: GatewayOptions,
}

impl ExecutionGateway {
    pub fn new(engine: impl StorageEngine + 'static, options: GatewayOptions) -> Self {
        Self {
            engine: Box::new(engine),
            options,
        }
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Run the statement. The query is consumed; nothing of it outlives the call.
    pub fn execute(&self, query: ComposedQuery) -> ExecutionResult<TabularResult> {
        let template = query.source_template.name.as_str();
        let request = QueryRequest {
            statement: &query.statement_text,
            parameters: &query.parameters,
            columns: &query.source_template.result_columns,
            timeout: self.options.statement_timeout,
        };

        debug!(template, params = request.parameters.len(), "executing statement");
        match self.engine.query(&request) {
            Ok(result) => {
                debug!(template, rows = result.len(), "statement finished");
                Ok(result)
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    template,
                    error = %e,
                    backoff_ms = self.options.retry_backoff.as_millis() as u64,
                    "connection lost, retrying once"
                );
                std::thread::sleep(self.options.retry_backoff);
                self.engine.query(&request).inspect_err(|e| {
                    warn!(template, error = %e, "retry failed");
                })
            }
            Err(e) => {
                warn!(template, kind = %e.kind(), error = %e, "statement failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ExecutionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGateway")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
