//! Structured outcomes for write operations.
//!
//! Expected business failures (constraint violations) are values, not
//! panics or propagated errors: [`OperationOutcome::capture`] folds them
//! into a failed outcome with a stable code and a non-leaking message.
//! Programming errors keep propagating; they indicate a defect in calling
//! code and must abort the request loudly.

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// The result of a write operation as seen by service code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Whether the operation took effect.
    pub succeeded: bool,
    /// Stable code: `"Ok"` on success, otherwise an error code from the
    /// taxonomy (e.g. `"UniqueConstraintViolation"`).
    pub code: String,
    /// User-safe message. Raw engine detail never appears here.
    pub message: String,
    /// Optional payload serialized from the operation's return value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Whether the caller may retry the operation (with backoff).
    #[serde(default)]
    pub retryable: bool,
}

impl OperationOutcome {
    /// A successful outcome with no payload.
    pub fn success() -> Self {
        Self {
            succeeded: true,
            code: "Ok".to_string(),
            message: "operation completed".to_string(),
            payload: None,
            retryable: false,
        }
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// A failed outcome built from an error.
    pub fn from_error(err: &DataError) -> Self {
        if let Some(classification) = err.classification() {
            tracing::debug!(
                kind = %classification.kind,
                details = %classification.details,
                "engine failure folded into outcome"
            );
        }
        Self {
            succeeded: false,
            code: err.code().to_string(),
            message: err.user_message(),
            payload: None,
            retryable: err.is_retryable(),
        }
    }

    /// Applies the propagation policy to a result.
    ///
    /// Success and expected failures (business and infrastructure errors,
    /// and `PartialCommitFailure`, which gets its own distinct code)
    /// become outcomes. Programming errors are logged with full context
    /// and returned as `Err` so they abort the request.
    pub fn capture<T: Serialize>(result: DataResult<T>) -> DataResult<Self> {
        match result {
            Ok(value) => {
                let payload = serde_json::to_value(value).ok().filter(|v| !v.is_null());
                let mut outcome = Self::success();
                outcome.payload = payload;
                Ok(outcome)
            }
            Err(err) if err.is_programming() => {
                tracing::error!(code = err.code(), error = %err, "programming error in data access");
                Err(err)
            }
            Err(err) => Ok(Self::from_error(&err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classification, ErrorKind};

    #[test]
    fn test_capture_success_with_payload() {
        let outcome = OperationOutcome::capture(Ok(3u64)).unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.code, "Ok");
        assert_eq!(outcome.payload, Some(serde_json::json!(3)));
    }

    #[test]
    fn test_capture_business_error_becomes_outcome() {
        let err = DataError::Engine(Classification::new(
            ErrorKind::UniqueConstraintViolation,
            "UNIQUE constraint failed: accounts.code",
        ));
        let outcome = OperationOutcome::capture::<()>(Err(err)).unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.code, "UniqueConstraintViolation");
        assert!(!outcome.retryable);
        assert!(!outcome.message.contains("accounts.code"));
    }

    #[test]
    fn test_capture_infrastructure_error_is_retryable_outcome() {
        let err = DataError::Engine(Classification::timeout("deadline exceeded"));
        let outcome = OperationOutcome::capture::<()>(Err(err)).unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.code, "Timeout");
        assert!(outcome.retryable);
    }

    #[test]
    fn test_capture_programming_error_propagates() {
        let err = DataError::MissingValue {
            column: "total".to_string(),
        };
        let result = OperationOutcome::capture::<()>(Err(err));
        assert!(matches!(result, Err(DataError::MissingValue { .. })));
    }

    #[test]
    fn test_partial_commit_failure_gets_distinct_code() {
        let err = DataError::PartialCommitFailure {
            committed: vec![crate::tenant::TenantId::new("a")],
            failed: crate::tenant::TenantId::new("b"),
            source: Box::new(DataError::Engine(Classification::new(
                ErrorKind::ForeignKeyViolation,
                "FOREIGN KEY constraint failed",
            ))),
        };
        let outcome = OperationOutcome::capture::<()>(Err(err)).unwrap();
        assert_eq!(outcome.code, "PartialCommitFailure");
        assert!(!outcome.retryable);
    }
}
