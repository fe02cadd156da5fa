//! Per-item batch application with savepoint isolation.
//!
//! Each item runs under its own savepoint. A REQUIRED item that fails
//! aborts the whole scope; an OPTIONAL item that fails is rolled back to
//! its savepoint, recorded in the report, and skipped while processing
//! continues.

use serde::Serialize;

use crate::error::DataResult;
use crate::scope::TransactionScope;

/// One unit of work in a batch.
#[derive(Debug, Clone)]
pub struct BatchItem<T> {
    /// Label used in reports and logs.
    pub label: String,
    /// The payload handed to the writer.
    pub payload: T,
    /// Whether a failure of this item aborts the whole scope.
    pub required: bool,
}

impl<T> BatchItem<T> {
    /// An item whose failure aborts the whole batch.
    pub fn required(label: impl Into<String>, payload: T) -> Self {
        Self {
            label: label.into(),
            payload,
            required: true,
        }
    }

    /// An item whose failure is recorded and skipped.
    pub fn optional(label: impl Into<String>, payload: T) -> Self {
        Self {
            label: label.into(),
            payload,
            required: false,
        }
    }
}

/// A recorded failure of an optional batch item.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    /// Position of the item in the batch.
    pub index: usize,
    /// The item's label.
    pub label: String,
    /// Stable error code (see [`DataError::code`](crate::error::DataError::code)).
    pub code: String,
    /// User-safe message.
    pub message: String,
}

/// Outcome of a batch application.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Number of items applied.
    pub applied: usize,
    /// Optional items that failed and were skipped.
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    /// Whether every item was applied.
    pub fn all_applied(&self) -> bool {
        self.failures.is_empty()
    }
}

impl TransactionScope {
    /// Applies a batch of items, each under its own savepoint.
    ///
    /// The writer runs once per item against this scope. On a REQUIRED
    /// item's failure the scope is rolled back (nothing from the batch
    /// survives) and the item's error propagates. On an OPTIONAL item's
    /// failure only that item's work is reverted; the failure lands in the
    /// report and processing continues.
    ///
    /// The scope is left open on success; committing the surviving items
    /// remains the caller's decision.
    pub async fn apply_batch<T, F>(
        &mut self,
        items: &[BatchItem<T>],
        mut writer: F,
    ) -> DataResult<BatchReport>
    where
        F: AsyncFnMut(&TransactionScope, &T) -> DataResult<()>,
    {
        self.ensure_open("apply a batch in")?;

        let mut report = BatchReport::default();
        for (index, item) in items.iter().enumerate() {
            let savepoint = self.savepoint().await?;
            let result = writer(&*self, &item.payload).await;
            match result {
                Ok(()) => {
                    self.release(savepoint).await?;
                    report.applied += 1;
                }
                Err(err) if item.required => {
                    tracing::debug!(
                        scope = %self.id(),
                        item = %item.label,
                        code = err.code(),
                        "required batch item failed; aborting scope"
                    );
                    if let Err(rollback_err) = self.rollback().await {
                        tracing::warn!(
                            scope = %self.id(),
                            error = %rollback_err,
                            "rollback after required batch item failure also failed"
                        );
                    }
                    return Err(err);
                }
                Err(err) => {
                    self.rollback_to(&savepoint).await?;
                    self.release(savepoint).await?;
                    tracing::debug!(
                        scope = %self.id(),
                        item = %item.label,
                        code = err.code(),
                        "optional batch item failed; skipped"
                    );
                    report.failures.push(BatchFailure {
                        index,
                        label: item.label.clone(),
                        code: err.code().to_string(),
                        message: err.user_message(),
                    });
                }
            }
        }
        Ok(report)
    }
}
