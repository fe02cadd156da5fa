//! Audit trail hook.
//!
//! Builds one [`AuditRecord`] per recorded change and submits it to an
//! [`AuditSink`]. The sink is an external persistence target: this layer
//! constructs and submits records but does not define their storage
//! schema. Audit writes happen after commit; their failure is logged and
//! does not affect the committed operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::scope::{ChangeRecord, CommitSummary, EntityRef};
use crate::tenant::TenantId;

use super::{HookError, PostCommitHook};

/// One audit trail entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Unique record id.
    pub id: Uuid,
    /// The tenant whose data changed.
    pub tenant: TenantId,
    /// Who performed the operation.
    pub actor: String,
    /// What happened (`created`, `updated`, `deleted`).
    pub action: String,
    /// The entity touched.
    pub entity: EntityRef,
    /// Snapshot before the change, if captured.
    pub before: Option<serde_json::Value>,
    /// Snapshot after the change, if captured.
    pub after: Option<serde_json::Value>,
    /// When the owning scope committed.
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Builds a record from one recorded change.
    pub fn from_change(actor: &str, change: &ChangeRecord, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant: change.tenant.clone(),
            actor: actor.to_string(),
            action: change.action.to_string(),
            entity: change.entity.clone(),
            before: change.before.clone(),
            after: change.after.clone(),
            recorded_at,
        }
    }
}

/// An external persistence target for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one record.
    async fn append(&self, record: &AuditRecord) -> Result<(), HookError>;
}

/// Post-commit hook that writes an audit record per change.
pub struct AuditHook {
    sink: std::sync::Arc<dyn AuditSink>,
    actor: String,
}

impl AuditHook {
    /// Creates an audit hook writing to the given sink on behalf of the
    /// given actor.
    pub fn new(sink: std::sync::Arc<dyn AuditSink>, actor: impl Into<String>) -> Self {
        Self {
            sink,
            actor: actor.into(),
        }
    }
}

#[async_trait]
impl PostCommitHook for AuditHook {
    fn name(&self) -> &str {
        "audit"
    }

    async fn run(&self, summary: &CommitSummary) -> Result<(), HookError> {
        for change in &summary.changes {
            let record = AuditRecord::from_change(&self.actor, change, summary.committed_at);
            self.sink.append(&record).await?;
        }
        Ok(())
    }
}

/// In-memory sink, for tests and local development.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records appended so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<(), HookError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
