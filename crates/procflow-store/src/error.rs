//! Error types for the procflow-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`]. A failed
//! commit has always been rolled back by the time the caller sees the error;
//! [`StoreError::is_retryable`] says whether committing the same block again
//! could succeed.

use procflow_parse::{ElementKind, LocalId};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The commit did not finish before its deadline and was rolled back.
    #[error("commit exceeded its timeout after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    /// A sequence flow endpoint has no stored element of the declared kind.
    #[error("flow on line {line} points at {kind} {local_id}, which was not stored")]
    DanglingEndpoint {
        line: usize,
        kind: ElementKind,
        local_id: LocalId,
    },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// Whether retrying the whole operation might succeed.
    ///
    /// Busy or locked databases, I/O failures, timeouts and lost background
    /// tasks are transient. Constraint violations, dangling endpoints and
    /// schema problems will fail again with the same input.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(
                    ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                        | ErrorCode::SystemIoFailure
                        | ErrorCode::CannotOpen
                        | ErrorCode::DiskFull
                        | ErrorCode::OperationInterrupted
                )
            ),
            Self::Timeout { .. } | Self::TaskJoin(_) => true,
            Self::Migration { .. } | Self::DanglingEndpoint { .. } | Self::NotFound { .. } => false,
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
