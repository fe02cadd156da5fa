//! Change notification hook.
//!
//! Publishes one [`ChangeNotification`] per recorded change to an external
//! [`NotificationChannel`] (a real-time broadcast service or a message bus;
//! this layer treats it as a black box that may succeed or fail).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::scope::{ChangeAction, CommitSummary, EntityRef};
use crate::tenant::TenantId;

use super::{HookError, PostCommitHook};

/// A committed change, as broadcast to interested parties.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeNotification {
    /// The tenant whose data changed.
    pub tenant: TenantId,
    /// What happened.
    pub action: ChangeAction,
    /// The entity touched.
    pub entity: EntityRef,
    /// When the owning scope committed.
    pub occurred_at: DateTime<Utc>,
}

/// An external publish mechanism for change notifications.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Publishes one notification.
    async fn publish(&self, notification: &ChangeNotification) -> Result<(), HookError>;
}

/// Post-commit hook that broadcasts each recorded change.
pub struct NotifyHook {
    channel: std::sync::Arc<dyn NotificationChannel>,
}

impl NotifyHook {
    /// Creates a notify hook over the given channel.
    pub fn new(channel: std::sync::Arc<dyn NotificationChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl PostCommitHook for NotifyHook {
    fn name(&self) -> &str {
        "notify"
    }

    async fn run(&self, summary: &CommitSummary) -> Result<(), HookError> {
        for change in &summary.changes {
            let notification = ChangeNotification {
                tenant: change.tenant.clone(),
                action: change.action,
                entity: change.entity.clone(),
                occurred_at: summary.committed_at,
            };
            self.channel.publish(&notification).await?;
        }
        Ok(())
    }
}

/// In-memory channel, for tests and local development.
#[derive(Default)]
pub struct MemoryChannel {
    published: Mutex<Vec<ChangeNotification>>,
}

impl MemoryChannel {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notifications published so far.
    pub fn published(&self) -> Vec<ChangeNotification> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl NotificationChannel for MemoryChannel {
    async fn publish(&self, notification: &ChangeNotification) -> Result<(), HookError> {
        self.published.lock().push(notification.clone());
        Ok(())
    }
}
