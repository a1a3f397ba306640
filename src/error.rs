//! Error taxonomy shared by every core operation.

use serde::Serialize;
use thiserror::Error;

/// Result alias used across the crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Caller-facing error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Referenced person or court is absent.
    NotFound,
    /// Invalid input or transition.
    BadRequest,
    /// Authorization denied.
    Forbidden,
    /// Store failure, unexpected condition or consistency violation.
    InternalServerError,
}

impl ErrorKind {
    /// HTTP-style status code for the reply envelope.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::BadRequest => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::InternalServerError => 500,
        }
    }
}

/// Errors returned by core operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request failed validation.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authorization collaborator refused the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unexpected condition.
    #[error("internal error: {0}")]
    Internal(String),

    /// Post-mutation audit found violations; the transaction was rolled back.
    #[error("inconsistent data: {count} violation(s)")]
    Inconsistent {
        /// Violations reported by the auditor.
        count: usize,
    },

    /// Error raised by the SQLite store.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// View or payload serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Classifies the error for the reply envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::BadRequest(_) => ErrorKind::BadRequest,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::Internal(_)
            | CoreError::Inconsistent { .. }
            | CoreError::Store(_)
            | CoreError::Serialization(_) => ErrorKind::InternalServerError,
        }
    }

    /// HTTP-style status code.
    pub fn status(&self) -> u16 {
        self.kind().status()
    }

    /// Maps a unique-constraint failure to `BadRequest` with `message`,
    /// leaving every other error untouched.
    pub fn on_unique_violation(self, message: impl Into<String>) -> Self {
        match self {
            CoreError::Store(err) if is_unique_violation(&err) => {
                CoreError::BadRequest(message.into())
            }
            other => other,
        }
    }
}

/// True when `err` reports a UNIQUE or PRIMARY KEY constraint failure.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}
