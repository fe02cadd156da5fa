//! Error types for the data access layer.
//!
//! One enum, three families. Programming errors (`InvalidScopeState`,
//! `MissingValue`, `TypeMismatch`, ...) indicate a defect in calling code
//! and should abort the request loudly. Business errors (the constraint
//! kinds carried by [`Engine`](DataError::Engine)) are expected conditions
//! and fold into an [`OperationOutcome`](crate::outcome::OperationOutcome).
//! Infrastructure errors (`Timeout`, `ConnectivityFailure`) are retryable
//! by the caller; this layer performs no automatic retry.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::classify::{Classification, ErrorKind, classify, classify_pool};
use crate::scope::ScopeState;
use crate::tenant::TenantId;

/// The primary error type for all data access operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// The tenant does not exist in the router configuration. Terminal,
    /// not retried.
    #[error("tenant not found: {tenant}")]
    TenantNotFound { tenant: TenantId },

    /// The tenant is not a participant in the scope the call was made on.
    #[error("tenant {tenant} is not a participant in this scope")]
    TenantNotInScope { tenant: TenantId },

    /// A single-tenant executor call was made on a joint scope.
    #[error("scope spans {count} tenants; the call must name its target tenant")]
    AmbiguousTenant { count: usize },

    /// A lifecycle operation was attempted on a scope that has already
    /// reached a terminal state.
    #[error("invalid scope state: cannot {operation} a scope that is {state}")]
    InvalidScopeState {
        operation: &'static str,
        state: ScopeState,
    },

    /// A savepoint handle from another scope (or an already-released one)
    /// was used.
    #[error("savepoint '{name}' does not belong to this scope")]
    UnknownSavepoint { name: String },

    /// A row mapper asked for a column that is absent or null without
    /// supplying a default.
    #[error("missing value for column '{column}'")]
    MissingValue { column: String },

    /// A row mapper asked for a type the stored value cannot strictly
    /// convert to.
    #[error("type mismatch for column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A joint commit failed after at least one participant had already
    /// committed. The committed work is durable; the caller must treat this
    /// as requiring manual reconciliation, not simple retry.
    #[error(
        "joint commit failed for tenant {failed} after {} participant(s) had committed",
        .committed.len()
    )]
    PartialCommitFailure {
        committed: Vec<TenantId>,
        failed: TenantId,
        #[source]
        source: Box<DataError>,
    },

    /// Invalid configuration or invalid arguments to this layer.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A classified engine-level failure. See [`crate::classify`].
    #[error("{0}")]
    Engine(Classification),
}

impl DataError {
    /// Stable code string for outcomes and logs.
    pub fn code(&self) -> &'static str {
        match self {
            DataError::TenantNotFound { .. } => "TenantNotFound",
            DataError::TenantNotInScope { .. } => "TenantNotInScope",
            DataError::AmbiguousTenant { .. } => "AmbiguousTenant",
            DataError::InvalidScopeState { .. } => "InvalidScopeState",
            DataError::UnknownSavepoint { .. } => "UnknownSavepoint",
            DataError::MissingValue { .. } => "MissingValue",
            DataError::TypeMismatch { .. } => "TypeMismatch",
            DataError::PartialCommitFailure { .. } => "PartialCommitFailure",
            DataError::Configuration { .. } => "Configuration",
            DataError::Engine(c) => c.kind.as_str(),
        }
    }

    /// Returns the engine classification, if this is an engine failure.
    pub fn classification(&self) -> Option<&Classification> {
        match self {
            DataError::Engine(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the taxonomy kind for engine failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.classification().map(|c| c.kind)
    }

    /// True for defects in calling code. These should abort the request
    /// loudly rather than fold into an outcome.
    pub fn is_programming(&self) -> bool {
        matches!(
            self,
            DataError::TenantNotInScope { .. }
                | DataError::AmbiguousTenant { .. }
                | DataError::InvalidScopeState { .. }
                | DataError::UnknownSavepoint { .. }
                | DataError::MissingValue { .. }
                | DataError::TypeMismatch { .. }
                | DataError::Configuration { .. }
        )
    }

    /// True for expected, user-recoverable business failures.
    pub fn is_business(&self) -> bool {
        matches!(
            self.kind(),
            Some(
                ErrorKind::UniqueConstraintViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::CheckConstraintViolation
            )
        )
    }

    /// Whether the caller may retry the operation (with backoff).
    ///
    /// `PartialCommitFailure` is deliberately not retryable: one half of
    /// the work may already be durable.
    pub fn is_retryable(&self) -> bool {
        match self {
            DataError::Engine(c) => c.retryable,
            _ => false,
        }
    }

    /// A message safe to show to a user. Raw engine detail never appears
    /// here; it lives in [`Classification::details`] for logs.
    pub fn user_message(&self) -> String {
        match self {
            DataError::Engine(c) => c.user_message.to_string(),
            DataError::TenantNotFound { .. } => "the requested tenant is not configured".to_string(),
            DataError::PartialCommitFailure { .. } => {
                "the operation was only partially applied and requires reconciliation".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias for data access operations.
pub type DataResult<T> = Result<T, DataError>;

impl From<rusqlite::Error> for DataError {
    fn from(err: rusqlite::Error) -> Self {
        DataError::Engine(classify(&err))
    }
}

impl From<r2d2::Error> for DataError {
    fn from(err: r2d2::Error) -> Self {
        DataError::Engine(classify_pool(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DataError::TenantNotFound {
            tenant: TenantId::new("ghost"),
        };
        assert_eq!(err.to_string(), "tenant not found: ghost");
        assert_eq!(err.code(), "TenantNotFound");

        let err = DataError::MissingValue {
            column: "total".to_string(),
        };
        assert_eq!(err.to_string(), "missing value for column 'total'");
        assert!(err.is_programming());
    }

    #[test]
    fn test_engine_error_from_rusqlite() {
        let raw = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            Some("UNIQUE constraint failed: t.c".to_string()),
        );
        let err: DataError = raw.into();
        assert_eq!(err.code(), "UniqueConstraintViolation");
        assert!(err.is_business());
        assert!(!err.is_retryable());
        assert!(!err.user_message().contains("t.c"));
    }

    #[test]
    fn test_partial_commit_failure_shape() {
        let source = DataError::Engine(Classification::new(
            ErrorKind::ForeignKeyViolation,
            "FOREIGN KEY constraint failed",
        ));
        let err = DataError::PartialCommitFailure {
            committed: vec![TenantId::new("a")],
            failed: TenantId::new("b"),
            source: Box::new(source),
        };
        assert_eq!(err.code(), "PartialCommitFailure");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("tenant b"));
    }

    #[test]
    fn test_retryable_flags() {
        let timeout = DataError::Engine(Classification::timeout("deadline exceeded"));
        assert!(timeout.is_retryable());
        assert!(!timeout.is_business());

        let conn = DataError::Engine(Classification::connectivity("pool exhausted"));
        assert!(conn.is_retryable());
    }
}
