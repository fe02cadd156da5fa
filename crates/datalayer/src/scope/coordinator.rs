//! Scope creation and convenience wrappers.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{DataError, DataResult};
use crate::hooks::HookPipeline;
use crate::router::ConnectionRouter;
use crate::tenant::TenantId;

use super::TransactionScope;

/// Options for opening a scope.
#[derive(Debug, Clone, Default)]
pub struct ScopeOptions {
    /// Deadline for statements executed in the scope. Exceeding it fails
    /// the statement with a retryable `Timeout` classification.
    pub timeout: Option<Duration>,

    /// Open the underlying transactions deferred, for read-only work.
    pub read_only: bool,
}

impl ScopeOptions {
    /// Creates options with defaults (no deadline, read-write).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the statement deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks the scope read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Creates [`TransactionScope`]s against tenants resolved through a
/// [`ConnectionRouter`].
///
/// The coordinator is constructed explicitly and passed to consumers;
/// there is no ambient "current scope": every executor call names its
/// scope, so concurrency behavior is visible at each call site.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use helios_datalayer::config::{ConnectionDescriptor, RouterConfig};
/// use helios_datalayer::router::ConnectionRouter;
/// use helios_datalayer::scope::TransactionCoordinator;
/// use helios_datalayer::tenant::TenantId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let router = Arc::new(ConnectionRouter::new(
///     RouterConfig::new().with_tenant("acme", ConnectionDescriptor::new("/data/acme.db")),
/// )?);
/// let coordinator = TransactionCoordinator::new(router);
///
/// let mut scope = coordinator.begin(&TenantId::new("acme")).await?;
/// scope.execute("DELETE FROM stale_sessions", &[]).await?;
/// scope.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct TransactionCoordinator {
    router: Arc<ConnectionRouter>,
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("router", &self.router)
            .finish()
    }
}

impl TransactionCoordinator {
    /// Creates a coordinator over the given router.
    pub fn new(router: Arc<ConnectionRouter>) -> Self {
        Self { router }
    }

    /// The router this coordinator resolves tenants through.
    pub fn router(&self) -> &Arc<ConnectionRouter> {
        &self.router
    }

    /// Opens a scope over one tenant.
    pub async fn begin(&self, tenant: &TenantId) -> DataResult<TransactionScope> {
        self.begin_with(tenant, ScopeOptions::default()).await
    }

    /// Opens a scope over one tenant with explicit options.
    pub async fn begin_with(
        &self,
        tenant: &TenantId,
        options: ScopeOptions,
    ) -> DataResult<TransactionScope> {
        self.begin_multi_with(std::slice::from_ref(tenant), options)
            .await
    }

    /// Opens a joint scope spanning several tenants.
    ///
    /// One connection per tenant is held for the lifetime of the scope;
    /// keep joint scopes short to avoid starving per-tenant pools. Commit
    /// order is the argument order; see [`TransactionScope::commit`] for
    /// the partial-failure semantics.
    pub async fn begin_multi(&self, tenants: &[TenantId]) -> DataResult<TransactionScope> {
        self.begin_multi_with(tenants, ScopeOptions::default())
            .await
    }

    /// Opens a joint scope with explicit options.
    pub async fn begin_multi_with(
        &self,
        tenants: &[TenantId],
        options: ScopeOptions,
    ) -> DataResult<TransactionScope> {
        if tenants.is_empty() {
            return Err(DataError::Configuration {
                message: "a scope needs at least one tenant".to_string(),
            });
        }
        for (index, tenant) in tenants.iter().enumerate() {
            if tenants[..index].contains(tenant) {
                return Err(DataError::Configuration {
                    message: format!("tenant {} listed more than once", tenant),
                });
            }
        }

        // Resolve every tenant before acquiring any connection, so an
        // unknown tenant fails without holding pool capacity.
        let mut pools = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            pools.push((tenant.clone(), self.router.resolve(tenant)?));
        }

        let mut participants = Vec::with_capacity(pools.len());
        for (tenant, pool) in pools {
            let conn = pool.acquire()?;
            participants.push((tenant, conn));
        }

        TransactionScope::open(participants, &options)
    }

    /// Runs a unit of work in its own scope, committing on `Ok` and
    /// rolling back on `Err`.
    ///
    /// The implicit rollback covers the error path, so callers need no
    /// explicit rollback there; the unit of work's error is returned
    /// unchanged.
    pub async fn with_scope<T, F>(&self, tenant: &TenantId, work: F) -> DataResult<T>
    where
        F: AsyncFnOnce(&mut TransactionScope) -> DataResult<T>,
    {
        let mut scope = self.begin(tenant).await?;
        match work(&mut scope).await {
            Ok(value) => {
                scope.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if scope.is_open()
                    && let Err(rollback_err) = scope.rollback().await
                {
                    tracing::warn!(
                        scope = %scope.id(),
                        error = %rollback_err,
                        "implicit rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Like [`with_scope`](Self::with_scope), additionally firing the
    /// post-commit pipeline with the commit summary on success.
    pub async fn with_scope_notifying<T, F>(
        &self,
        tenant: &TenantId,
        pipeline: &HookPipeline,
        work: F,
    ) -> DataResult<T>
    where
        F: AsyncFnOnce(&mut TransactionScope) -> DataResult<T>,
    {
        let mut scope = self.begin(tenant).await?;
        match work(&mut scope).await {
            Ok(value) => {
                let summary = scope.commit().await?;
                pipeline.after_commit(summary).await;
                Ok(value)
            }
            Err(err) => {
                if scope.is_open()
                    && let Err(rollback_err) = scope.rollback().await
                {
                    tracing::warn!(
                        scope = %scope.id(),
                        error = %rollback_err,
                        "implicit rollback failed"
                    );
                }
                Err(err)
            }
        }
    }
}
