//! Classification of raw engine errors into a closed taxonomy.
//!
//! Everything the storage engine can throw at us is folded into the small
//! set of [`ErrorKind`]s that callers are allowed to depend on. The raw
//! engine message is preserved in [`Classification::details`] for logs; the
//! user-facing message is a stable, non-leaking string chosen per kind.

use std::fmt;

use rusqlite::ffi;
use serde::Serialize;

/// The closed taxonomy of engine-level failures.
///
/// Constraint kinds are business errors a caller can surface to a user;
/// `Timeout` and `ConnectivityFailure` are infrastructure conditions worth
/// retrying with backoff; `Unknown` is everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// A record with equivalent identity already exists.
    UniqueConstraintViolation,
    /// The operation would violate a referential relationship.
    ForeignKeyViolation,
    /// A value fails a domain rule.
    CheckConstraintViolation,
    /// The operation exceeded its allotted time.
    Timeout,
    /// The engine could not be reached or a connection could not be had.
    ConnectivityFailure,
    /// Anything else. Full detail goes to logs only.
    Unknown,
}

impl ErrorKind {
    /// Stable code string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UniqueConstraintViolation => "UniqueConstraintViolation",
            ErrorKind::ForeignKeyViolation => "ForeignKeyViolation",
            ErrorKind::CheckConstraintViolation => "CheckConstraintViolation",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::ConnectivityFailure => "ConnectivityFailure",
            ErrorKind::Unknown => "Unknown",
        }
    }

    /// Stable user-facing message for this kind. Never contains engine text.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::UniqueConstraintViolation => {
                "a record with the same identity already exists"
            }
            ErrorKind::ForeignKeyViolation => "the operation references data that does not exist",
            ErrorKind::CheckConstraintViolation => "a value is outside the allowed range",
            ErrorKind::Timeout => "the operation took too long and was cancelled",
            ErrorKind::ConnectivityFailure => "the database is temporarily unavailable",
            ErrorKind::Unknown => "an unexpected storage error occurred",
        }
    }

    /// Whether a caller may retry the failed operation (with backoff).
    pub fn retryable(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::ConnectivityFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The result of classifying one raw engine error.
#[derive(Debug, Clone)]
pub struct Classification {
    /// The taxonomy kind.
    pub kind: ErrorKind,
    /// Stable message safe to show to a user.
    pub user_message: &'static str,
    /// Whether the caller may retry.
    pub retryable: bool,
    /// Raw engine detail. Intended for logs only; never shown to users.
    pub details: String,
}

impl Classification {
    /// Builds a classification for the given kind, attaching raw detail.
    pub fn new(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            user_message: kind.user_message(),
            retryable: kind.retryable(),
            details: details.into(),
        }
    }

    /// A `Timeout` classification for deadlines enforced by this layer
    /// rather than by the engine.
    pub fn timeout(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, details)
    }

    /// A `ConnectivityFailure` classification for pool and open failures.
    pub fn connectivity(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectivityFailure, details)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.user_message)
    }
}

/// Classifies a raw engine error.
///
/// Deterministic: classifying the same error twice yields the same kind and
/// retryable flag. Constraint violations are told apart by the extended
/// result code; lock contention maps to `Timeout`, open/IO failures map to
/// `ConnectivityFailure`, and everything unrecognized is `Unknown`.
pub fn classify(err: &rusqlite::Error) -> Classification {
    let details = err.to_string();

    if let rusqlite::Error::SqliteFailure(code, _) = err {
        match code.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return Classification::new(ErrorKind::UniqueConstraintViolation, details);
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return Classification::new(ErrorKind::ForeignKeyViolation, details);
            }
            // NOT NULL has no dedicated kind in the taxonomy; it is a value
            // failing a domain rule.
            ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                return Classification::new(ErrorKind::CheckConstraintViolation, details);
            }
            _ => {}
        }

        use rusqlite::ErrorCode;
        match code.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::OperationInterrupted => {
                return Classification::new(ErrorKind::Timeout, details);
            }
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::PermissionDenied
            | ErrorCode::SystemIoFailure
            | ErrorCode::DiskFull => {
                return Classification::new(ErrorKind::ConnectivityFailure, details);
            }
            ErrorCode::ConstraintViolation => {
                // Generic constraint code with no recognized extended code.
                return Classification::new(ErrorKind::CheckConstraintViolation, details);
            }
            _ => {}
        }
    }

    Classification::new(ErrorKind::Unknown, details)
}

/// Classifies a pool acquisition failure.
///
/// r2d2 reports both pool-exhaustion timeouts and failed opens through one
/// opaque error type; either way the engine was unreachable from the
/// caller's point of view.
pub fn classify_pool(err: &r2d2::Error) -> Classification {
    Classification::connectivity(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_violation() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code: ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            Some("UNIQUE constraint failed: accounts.code".to_string()),
        )
    }

    #[test]
    fn test_classify_unique_violation() {
        let c = classify(&unique_violation());
        assert_eq!(c.kind, ErrorKind::UniqueConstraintViolation);
        assert!(!c.retryable);
        assert!(c.details.contains("accounts.code"));
        assert!(!c.user_message.contains("accounts"));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let err = unique_violation();
        let first = classify(&err);
        let second = classify(&err);
        assert_eq!(first.kind, second.kind);
        assert_eq!(first.retryable, second.retryable);
    }

    #[test]
    fn test_classify_foreign_key() {
        let err = rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code: ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            },
            None,
        );
        assert_eq!(classify(&err).kind, ErrorKind::ForeignKeyViolation);
    }

    #[test]
    fn test_classify_check_and_not_null() {
        for extended in [ffi::SQLITE_CONSTRAINT_CHECK, ffi::SQLITE_CONSTRAINT_NOTNULL] {
            let err = rusqlite::Error::SqliteFailure(
                ffi::Error {
                    code: rusqlite::ErrorCode::ConstraintViolation,
                    extended_code: extended,
                },
                None,
            );
            assert_eq!(classify(&err).kind, ErrorKind::CheckConstraintViolation);
        }
    }

    #[test]
    fn test_classify_busy_is_retryable() {
        let err = rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: rusqlite::ErrorCode::DatabaseBusy,
                extended_code: ffi::SQLITE_BUSY,
            },
            Some("database is locked".to_string()),
        );
        let c = classify(&err);
        assert_eq!(c.kind, ErrorKind::Timeout);
        assert!(c.retryable);
    }

    #[test]
    fn test_classify_cannot_open() {
        let err = rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: rusqlite::ErrorCode::CannotOpen,
                extended_code: ffi::SQLITE_CANTOPEN,
            },
            None,
        );
        let c = classify(&err);
        assert_eq!(c.kind, ErrorKind::ConnectivityFailure);
        assert!(c.retryable);
    }

    #[test]
    fn test_classify_unrecognized_is_unknown() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        let c = classify(&err);
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(!c.retryable);
    }
}
