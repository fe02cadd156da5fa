//! Post-commit side effects.
//!
//! Hooks run only after a successful commit and outside any transaction
//! boundary. Each hook runs independently: its failure is caught and
//! logged, and never alters the already-returned operation outcome.
//!
//! Delivery is at-most-once-but-possibly-zero: a process crash between
//! commit and hook execution loses the hook call, and there is no replay
//! mechanism in this design. Hooks must be idempotent or tolerant of that.
//! Fire-and-forget delivery additionally does not finish before the
//! caller's operation returns.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::scope::CommitSummary;

pub mod audit;
pub mod notify;

/// Failure of a single hook. Logged by the pipeline, never propagated to
/// the committing caller.
#[derive(Debug, Clone, Error)]
#[error("hook '{hook}' failed: {message}")]
pub struct HookError {
    /// The hook that failed.
    pub hook: String,
    /// What went wrong.
    pub message: String,
}

impl HookError {
    /// Creates a hook error.
    pub fn new(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// A best-effort side effect run after a successful commit.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs the side effect for one committed scope.
    async fn run(&self, summary: &CommitSummary) -> Result<(), HookError>;
}

/// How the pipeline delivers hook executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Hooks complete before `after_commit` returns.
    #[default]
    Inline,
    /// Hooks run on a spawned task; the caller's operation returns
    /// immediately.
    FireAndForget,
}

/// Runs registered hooks, in registration order, after successful commits.
///
/// # Example
///
/// ```ignore
/// let pipeline = HookPipeline::new()
///     .with_hook(Arc::new(AuditHook::new(sink, "svc-billing")))
///     .with_hook(Arc::new(NotifyHook::new(channel)));
///
/// let summary = scope.commit().await?;
/// pipeline.after_commit(summary).await;
/// ```
#[derive(Clone, Default)]
pub struct HookPipeline {
    hooks: Vec<Arc<dyn PostCommitHook>>,
    delivery: Delivery,
}

impl std::fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookPipeline")
            .field("hooks", &self.hooks.iter().map(|h| h.name().to_string()).collect::<Vec<_>>())
            .field("delivery", &self.delivery)
            .finish()
    }
}

impl HookPipeline {
    /// Creates an empty inline pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty fire-and-forget pipeline.
    pub fn fire_and_forget() -> Self {
        Self {
            hooks: Vec::new(),
            delivery: Delivery::FireAndForget,
        }
    }

    /// Appends a hook. Hooks run in registration order.
    pub fn with_hook(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// The configured delivery mode.
    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs the hooks for a committed scope.
    ///
    /// Call this only with the summary of a successful commit; the type
    /// makes that hard to get wrong, since only
    /// [`TransactionScope::commit`](crate::scope::TransactionScope::commit)
    /// produces one.
    pub async fn after_commit(&self, summary: CommitSummary) {
        if self.hooks.is_empty() {
            return;
        }
        match self.delivery {
            Delivery::Inline => Self::run_hooks(&self.hooks, &summary).await,
            Delivery::FireAndForget => {
                let hooks = self.hooks.clone();
                tokio::spawn(async move {
                    Self::run_hooks(&hooks, &summary).await;
                });
            }
        }
    }

    async fn run_hooks(hooks: &[Arc<dyn PostCommitHook>], summary: &CommitSummary) {
        for hook in hooks {
            if let Err(err) = hook.run(summary).await {
                tracing::warn!(
                    scope = %summary.scope_id,
                    hook = hook.name(),
                    error = %err,
                    "post-commit hook failed; operation outcome unaffected"
                );
            }
        }
    }
}
