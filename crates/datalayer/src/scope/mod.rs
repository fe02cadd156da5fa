//! Transaction scopes.
//!
//! A [`TransactionScope`] owns the live connection(s) opened for a single
//! logical operation and walks the state machine
//! `Open -> {Committed, RolledBack}`. Exactly one terminal transition is
//! allowed; a second commit or rollback is a programming error. Dropping a
//! scope that is still open rolls it back.
//!
//! Joint scopes (more than one tenant) commit their participants
//! sequentially in the order the connections were opened. This is a
//! best-effort joint commit, not a distributed two-phase commit: a later
//! commit failing after an earlier one succeeded surfaces
//! [`PartialCommitFailure`](crate::error::DataError::PartialCommitFailure)
//! and leaves the earlier work durable. Callers that need true atomicity
//! across tenants need an outbox/saga on top of this layer.

use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{DataError, DataResult};
use crate::tenant::TenantId;

mod coordinator;

pub use coordinator::{ScopeOptions, TransactionCoordinator};

/// Lifecycle state of a [`TransactionScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeState {
    /// The scope accepts statements, savepoints, and a terminal transition.
    Open,
    /// All participants committed (or, after a partial failure, at least
    /// one did; see [`DataError::PartialCommitFailure`]).
    Committed,
    /// All participants rolled back.
    RolledBack,
}

impl std::fmt::Display for ScopeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeState::Open => write!(f, "open"),
            ScopeState::Committed => write!(f, "committed"),
            ScopeState::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// What a change did to an entity. Carried in [`ChangeRecord`]s for the
/// post-commit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// A new entity was inserted.
    Created,
    /// An existing entity was modified.
    Updated,
    /// An entity was removed.
    Deleted,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Created => write!(f, "created"),
            ChangeAction::Updated => write!(f, "updated"),
            ChangeAction::Deleted => write!(f, "deleted"),
        }
    }
}

/// Reference to the entity a change touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    /// The entity kind, e.g. a table or aggregate name.
    pub kind: String,
    /// The entity's identifier within its kind.
    pub id: String,
}

impl EntityRef {
    /// Creates an entity reference.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// One recorded change, accumulated on the scope while it is open and
/// handed to the post-commit pipeline in the [`CommitSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    /// The tenant whose database the change was written to.
    pub tenant: TenantId,
    /// What happened.
    pub action: ChangeAction,
    /// The entity touched.
    pub entity: EntityRef,
    /// Snapshot before the change, if the caller captured one.
    pub before: Option<serde_json::Value>,
    /// Snapshot after the change, if the caller captured one.
    pub after: Option<serde_json::Value>,
}

impl ChangeRecord {
    /// A creation: no before-image.
    pub fn created(tenant: TenantId, entity: EntityRef, after: serde_json::Value) -> Self {
        Self {
            tenant,
            action: ChangeAction::Created,
            entity,
            before: None,
            after: Some(after),
        }
    }

    /// An update with both images.
    pub fn updated(
        tenant: TenantId,
        entity: EntityRef,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self {
            tenant,
            action: ChangeAction::Updated,
            entity,
            before: Some(before),
            after: Some(after),
        }
    }

    /// A deletion: no after-image.
    pub fn deleted(tenant: TenantId, entity: EntityRef, before: serde_json::Value) -> Self {
        Self {
            tenant,
            action: ChangeAction::Deleted,
            entity,
            before: Some(before),
            after: None,
        }
    }
}

/// Returned by a successful [`TransactionScope::commit`]; the input to the
/// post-commit hook pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    /// The scope that committed.
    pub scope_id: Uuid,
    /// Participating tenants, in connection-open order.
    pub tenants: Vec<TenantId>,
    /// Changes recorded while the scope was open.
    pub changes: Vec<ChangeRecord>,
    /// When the (last) participant committed.
    pub committed_at: DateTime<Utc>,
}

/// A named rollback point inside an open scope.
///
/// Handles are sequence-numbered and bound to the scope that created them;
/// using a handle on another scope is a programming error.
#[derive(Debug)]
pub struct SavepointHandle {
    scope_id: Uuid,
    seq: u32,
    name: String,
}

impl SavepointHandle {
    /// The savepoint's name as issued to the engine.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The savepoint's sequence number within its scope (1-based).
    pub fn seq(&self) -> u32 {
        self.seq
    }
}

/// One participant connection held by a scope.
pub(crate) struct ScopeConnection {
    pub(crate) tenant: TenantId,
    pub(crate) conn: Mutex<PooledConnection<SqliteConnectionManager>>,
}

impl ScopeConnection {
    fn run(&self, sql: &str) -> Result<(), rusqlite::Error> {
        self.conn.lock().execute_batch(sql)
    }
}

/// The unit-of-work boundary for one logical operation.
///
/// Obtained from a [`TransactionCoordinator`]; not safe for concurrent use
/// from two callers; each call site owns its own scope. Statements run in
/// submission order through the executor methods (see [`crate::executor`]).
pub struct TransactionScope {
    id: Uuid,
    connections: Vec<ScopeConnection>,
    state: ScopeState,
    savepoint_seq: u32,
    deadline: Option<Instant>,
    changes: Vec<ChangeRecord>,
}

impl std::fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("tenants", &self.tenants())
            .finish_non_exhaustive()
    }
}

impl TransactionScope {
    pub(crate) fn open(
        participants: Vec<(TenantId, PooledConnection<SqliteConnectionManager>)>,
        options: &ScopeOptions,
    ) -> DataResult<Self> {
        let begin_sql = if options.read_only {
            "BEGIN DEFERRED"
        } else {
            "BEGIN IMMEDIATE"
        };

        let mut connections: Vec<ScopeConnection> = Vec::with_capacity(participants.len());
        for (tenant, conn) in participants {
            if let Err(err) = conn.execute_batch(begin_sql) {
                for earlier in &connections {
                    let _ = earlier.run("ROLLBACK");
                }
                return Err(err.into());
            }
            connections.push(ScopeConnection {
                tenant,
                conn: Mutex::new(conn),
            });
        }

        let id = Uuid::new_v4();
        tracing::debug!(scope = %id, participants = connections.len(), "scope opened");

        Ok(Self {
            id,
            connections,
            state: ScopeState::Open,
            savepoint_seq: 0,
            deadline: options.timeout.map(|t| Instant::now() + t),
            changes: Vec::new(),
        })
    }

    /// The scope's unique identifier (for correlation in logs).
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Whether the scope still accepts work.
    pub fn is_open(&self) -> bool {
        self.state == ScopeState::Open
    }

    /// Participating tenants, in connection-open order.
    pub fn tenants(&self) -> Vec<TenantId> {
        self.connections.iter().map(|c| c.tenant.clone()).collect()
    }

    /// Changes recorded so far.
    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    /// Records a change for the post-commit pipeline.
    pub fn record_change(&mut self, change: ChangeRecord) -> DataResult<()> {
        self.ensure_open("record a change in")?;
        self.changes.push(change);
        Ok(())
    }

    pub(crate) fn ensure_open(&self, operation: &'static str) -> DataResult<()> {
        if self.state == ScopeState::Open {
            Ok(())
        } else {
            Err(DataError::InvalidScopeState {
                operation,
                state: self.state,
            })
        }
    }

    pub(crate) fn check_deadline(&self) -> DataResult<()> {
        if let Some(deadline) = self.deadline
            && Instant::now() > deadline
        {
            return Err(DataError::Engine(crate::classify::Classification::timeout(
                format!("scope {} exceeded its deadline", self.id),
            )));
        }
        Ok(())
    }

    pub(crate) fn sole_connection(&self) -> DataResult<&ScopeConnection> {
        match self.connections.as_slice() {
            [only] => Ok(only),
            many => Err(DataError::AmbiguousTenant { count: many.len() }),
        }
    }

    pub(crate) fn connection_for(&self, tenant: &TenantId) -> DataResult<&ScopeConnection> {
        self.connections
            .iter()
            .find(|c| &c.tenant == tenant)
            .ok_or_else(|| DataError::TenantNotInScope {
                tenant: tenant.clone(),
            })
    }

    /// Creates a savepoint on every participant.
    ///
    /// Valid only while the scope is open. Savepoints are sequence-numbered
    /// within the scope; rolling back to one reverts only work performed
    /// after it.
    pub async fn savepoint(&mut self) -> DataResult<SavepointHandle> {
        self.ensure_open("create a savepoint in")?;
        self.savepoint_seq += 1;
        let name = format!("sp_{}", self.savepoint_seq);
        for sc in &self.connections {
            sc.run(&format!("SAVEPOINT {}", name))?;
        }
        Ok(SavepointHandle {
            scope_id: self.id,
            seq: self.savepoint_seq,
            name,
        })
    }

    fn check_handle(&self, handle: &SavepointHandle) -> DataResult<()> {
        if handle.scope_id == self.id {
            Ok(())
        } else {
            Err(DataError::UnknownSavepoint {
                name: handle.name.clone(),
            })
        }
    }

    /// Reverts all work performed since the savepoint, on every
    /// participant, without ending the scope.
    ///
    /// The savepoint itself survives and can be rolled back to again until
    /// it is [`release`](Self::release)d.
    pub async fn rollback_to(&mut self, handle: &SavepointHandle) -> DataResult<()> {
        self.ensure_open("roll back to a savepoint in")?;
        self.check_handle(handle)?;
        for sc in &self.connections {
            sc.run(&format!("ROLLBACK TO {}", handle.name))?;
        }
        Ok(())
    }

    /// Releases a savepoint, folding its work into the enclosing
    /// transaction (or enclosing savepoint).
    pub async fn release(&mut self, handle: SavepointHandle) -> DataResult<()> {
        self.ensure_open("release a savepoint in")?;
        self.check_handle(&handle)?;
        for sc in &self.connections {
            sc.run(&format!("RELEASE {}", handle.name))?;
        }
        Ok(())
    }

    /// Commits every participant, in connection-open order.
    ///
    /// On a joint scope this is a best-effort joint commit: if a later
    /// participant's commit fails after an earlier one succeeded, the
    /// already-committed work stays durable, the remaining participants
    /// are rolled back, and the error is
    /// [`DataError::PartialCommitFailure`]; the caller must treat that as
    /// requiring manual reconciliation, not simple retry. If the *first*
    /// commit fails, nothing is durable and the ordinary classified engine
    /// error is returned instead.
    pub async fn commit(&mut self) -> DataResult<CommitSummary> {
        self.ensure_open("commit")?;

        let mut committed: Vec<TenantId> = Vec::new();
        for (index, sc) in self.connections.iter().enumerate() {
            if let Err(err) = sc.run("COMMIT") {
                let source: DataError = err.into();
                // The failed participant's transaction is still open, as
                // are all later ones; roll them back.
                for later in &self.connections[index..] {
                    let _ = later.run("ROLLBACK");
                }
                if committed.is_empty() {
                    self.state = ScopeState::RolledBack;
                    self.changes.clear();
                    tracing::debug!(scope = %self.id, "commit failed with nothing durable; rolled back");
                    return Err(source);
                }
                self.state = ScopeState::Committed;
                tracing::error!(
                    scope = %self.id,
                    failed = %sc.tenant,
                    durable = committed.len(),
                    "joint commit failed after partial durability; manual reconciliation required"
                );
                return Err(DataError::PartialCommitFailure {
                    committed,
                    failed: sc.tenant.clone(),
                    source: Box::new(source),
                });
            }
            committed.push(sc.tenant.clone());
        }

        self.state = ScopeState::Committed;
        let summary = CommitSummary {
            scope_id: self.id,
            tenants: committed,
            changes: std::mem::take(&mut self.changes),
            committed_at: Utc::now(),
        };
        tracing::debug!(scope = %self.id, changes = summary.changes.len(), "scope committed");
        Ok(summary)
    }

    /// Rolls back every participant and discards recorded changes.
    pub async fn rollback(&mut self) -> DataResult<()> {
        self.ensure_open("roll back")?;

        let mut first_err: Option<DataError> = None;
        for sc in &self.connections {
            if let Err(err) = sc.run("ROLLBACK") {
                first_err.get_or_insert(err.into());
            }
        }
        self.state = ScopeState::RolledBack;
        self.changes.clear();
        tracing::debug!(scope = %self.id, "scope rolled back");

        match first_err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        // A scope abandoned while open rolls back so no write can leak.
        if self.state == ScopeState::Open {
            for sc in &self.connections {
                let _ = sc.run("ROLLBACK");
            }
            tracing::warn!(scope = %self.id, "scope dropped while open; rolled back");
        }
    }
}
