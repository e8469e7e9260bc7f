use std::error::Error as StdError;
use std::fmt;

/// Failure classes the gateway distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionErrorKind {
    /// The statement ran past its time budget and was interrupted.
    Timeout,
    /// The store could not be reached or was busy. Retried once.
    ConnectionLost,
    /// The statement, its parameters or its output shape are wrong.
    MalformedStatement,
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionErrorKind::Timeout => "timeout",
            ExecutionErrorKind::ConnectionLost => "connection lost",
            ExecutionErrorKind::MalformedStatement => "malformed statement",
        })
    }
}

/// An execution failure with its cause.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExecutionError {
    kind: ExecutionErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

impl ExecutionError {
    pub fn new(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Timeout, message)
    }

    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::ConnectionLost, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::MalformedStatement, message)
    }

    pub fn kind(&self) -> ExecutionErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Only a lost connection is worth a second attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind == ExecutionErrorKind::ConnectionLost
    }
}
