//! Tenant-to-connection routing.
//!
//! The [`ConnectionRouter`] resolves a [`TenantId`] to that tenant's
//! connection pool. Pools are built lazily on first resolution and cached
//! for the lifetime of the process; an explicit [`reload`](ConnectionRouter::reload)
//! swaps the whole map atomically, so readers never observe a half-updated
//! descriptor.
//!
//! The router is constructed explicitly and handed to consumers (typically
//! wrapped in an `Arc`); there is no process-wide instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::classify::Classification;
use crate::config::{ConnectionDescriptor, RouterConfig};
use crate::error::{DataError, DataResult};
use crate::tenant::TenantId;

/// A pooled set of connections to one tenant's database.
pub struct TenantPool {
    tenant: TenantId,
    descriptor: ConnectionDescriptor,
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for TenantPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantPool")
            .field("tenant", &self.tenant)
            .field("database", &self.descriptor.database)
            .finish_non_exhaustive()
    }
}

impl TenantPool {
    fn open(tenant: TenantId, descriptor: ConnectionDescriptor) -> DataResult<Self> {
        let manager = if descriptor.is_memory() {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(&descriptor.database)
        };

        let busy_timeout_ms = descriptor.busy_timeout_ms;
        let enforce_foreign_keys = descriptor.enforce_foreign_keys;
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
            if enforce_foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(descriptor.max_connections)
            .min_idle(Some(descriptor.min_connections))
            .connection_timeout(Duration::from_millis(descriptor.acquire_timeout_ms))
            .build(manager)
            .map_err(|e| {
                DataError::Engine(Classification::connectivity(format!(
                    "failed to open pool for tenant {}: {}",
                    tenant, e
                )))
            })?;

        tracing::info!(
            tenant = %tenant,
            database = %descriptor.database,
            max_connections = descriptor.max_connections,
            "opened tenant pool"
        );

        Ok(Self {
            tenant,
            descriptor,
            pool,
        })
    }

    /// Draws a connection from the pool.
    ///
    /// Blocks up to the descriptor's acquire timeout; exhaustion surfaces
    /// as a retryable `ConnectivityFailure`.
    pub(crate) fn acquire(&self) -> DataResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// The tenant this pool serves.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// The descriptor this pool was built from.
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// A snapshot of the pool's connection counts.
    pub fn stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections: state.connections,
            idle: state.idle_connections,
        }
    }
}

/// Point-in-time pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total open connections.
    pub connections: u32,
    /// Connections currently idle in the pool.
    pub idle: u32,
}

struct TenantEntry {
    descriptor: ConnectionDescriptor,
    pool: Option<Arc<TenantPool>>,
}

/// Resolves tenant identifiers to connection pools.
///
/// # Example
///
/// ```no_run
/// use helios_datalayer::config::{ConnectionDescriptor, RouterConfig};
/// use helios_datalayer::router::ConnectionRouter;
/// use helios_datalayer::tenant::TenantId;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RouterConfig::new()
///     .with_tenant("acme", ConnectionDescriptor::new("/data/acme.db"));
/// let router = ConnectionRouter::new(config)?;
///
/// let pool = router.resolve(&TenantId::new("acme"))?;
/// assert_eq!(pool.tenant().as_str(), "acme");
/// # Ok(())
/// # }
/// ```
pub struct ConnectionRouter {
    pattern: regex::Regex,
    entries: RwLock<HashMap<TenantId, TenantEntry>>,
}

impl std::fmt::Debug for ConnectionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRouter")
            .field("tenants", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl ConnectionRouter {
    /// Builds a router from the given configuration.
    ///
    /// Validates every tenant code against the configured pattern; pools
    /// are not opened until the tenant is first resolved.
    pub fn new(config: RouterConfig) -> DataResult<Self> {
        let pattern = regex::Regex::new(&config.tenant_pattern).map_err(|e| {
            DataError::Configuration {
                message: format!("invalid tenant pattern: {}", e),
            }
        })?;

        let entries = Self::build_entries(&pattern, config, None)?;
        Ok(Self {
            pattern,
            entries: RwLock::new(entries),
        })
    }

    fn build_entries(
        pattern: &regex::Regex,
        config: RouterConfig,
        previous: Option<&HashMap<TenantId, TenantEntry>>,
    ) -> DataResult<HashMap<TenantId, TenantEntry>> {
        let mut entries = HashMap::with_capacity(config.tenants.len());
        for (code, descriptor) in config.tenants {
            if !pattern.is_match(&code) {
                return Err(DataError::Configuration {
                    message: format!("tenant code '{}' does not match the allowed pattern", code),
                });
            }
            let tenant = TenantId::new(code);

            // Keep an already-open pool alive across a reload when its
            // descriptor did not change.
            let pool = previous
                .and_then(|prev| prev.get(&tenant))
                .filter(|entry| entry.descriptor == descriptor)
                .and_then(|entry| entry.pool.clone());

            entries.insert(tenant, TenantEntry { descriptor, pool });
        }
        Ok(entries)
    }

    /// Resolves a tenant to its connection pool.
    ///
    /// Deterministic between reloads: repeated calls return the same pool.
    /// Unknown tenants fail with [`DataError::TenantNotFound`].
    pub fn resolve(&self, tenant: &TenantId) -> DataResult<Arc<TenantPool>> {
        {
            let entries = self.entries.read();
            match entries.get(tenant) {
                Some(TenantEntry {
                    pool: Some(pool), ..
                }) => return Ok(Arc::clone(pool)),
                Some(_) => {}
                None => {
                    return Err(DataError::TenantNotFound {
                        tenant: tenant.clone(),
                    });
                }
            }
        }

        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(tenant)
            .ok_or_else(|| DataError::TenantNotFound {
                tenant: tenant.clone(),
            })?;
        // Another caller may have raced us to the write lock.
        if let Some(pool) = &entry.pool {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(TenantPool::open(tenant.clone(), entry.descriptor.clone())?);
        entry.pool = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Replaces the tenant map with a new configuration.
    ///
    /// The swap is atomic: concurrent resolvers see either the old map or
    /// the new one. Pools whose descriptors are unchanged survive the
    /// reload; removed tenants are dropped (their pools close once the
    /// last in-flight scope releases its connections).
    pub fn reload(&self, config: RouterConfig) -> DataResult<()> {
        let pattern = regex::Regex::new(&config.tenant_pattern).map_err(|e| {
            DataError::Configuration {
                message: format!("invalid tenant pattern: {}", e),
            }
        })?;

        let mut entries = self.entries.write();
        let next = Self::build_entries(&pattern, config, Some(&entries))?;
        let retained = next.values().filter(|e| e.pool.is_some()).count();
        tracing::info!(
            tenants = next.len(),
            retained_pools = retained,
            "router configuration reloaded"
        );
        *entries = next;
        Ok(())
    }

    /// Returns the configured tenant identifiers.
    pub fn tenants(&self) -> Vec<TenantId> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns whether the tenant exists in the current configuration.
    pub fn knows(&self, tenant: &TenantId) -> bool {
        self.entries.read().contains_key(tenant)
    }

    /// Pool statistics for a tenant, if its pool has been opened.
    pub fn stats(&self, tenant: &TenantId) -> DataResult<Option<PoolStats>> {
        let entries = self.entries.read();
        let entry = entries.get(tenant).ok_or_else(|| DataError::TenantNotFound {
            tenant: tenant.clone(),
        })?;
        Ok(entry.pool.as_ref().map(|p| p.stats()))
    }

    /// Verifies the tenant's database is reachable.
    pub async fn health_check(&self, tenant: &TenantId) -> DataResult<()> {
        let pool = self.resolve(tenant)?;
        let conn = pool.acquire()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// The pattern tenant codes are validated against.
    pub fn tenant_pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionDescriptor;

    fn router_with(code: &str) -> ConnectionRouter {
        let config = RouterConfig::new().with_tenant(code, ConnectionDescriptor::in_memory());
        ConnectionRouter::new(config).unwrap()
    }

    #[test]
    fn test_resolve_unknown_tenant() {
        let router = router_with("acme");
        let err = router.resolve(&TenantId::new("ghost")).unwrap_err();
        assert!(matches!(err, DataError::TenantNotFound { .. }));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let router = router_with("acme");
        let tenant = TenantId::new("acme");

        let first = router.resolve(&tenant).unwrap();
        let second = router.resolve(&tenant).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_invalid_tenant_code_rejected() {
        let config =
            RouterConfig::new().with_tenant("9 bad code!", ConnectionDescriptor::in_memory());
        let err = ConnectionRouter::new(config).unwrap_err();
        assert!(matches!(err, DataError::Configuration { .. }));
    }

    #[test]
    fn test_reload_keeps_unchanged_pools() {
        let router = router_with("acme");
        let tenant = TenantId::new("acme");
        let before = router.resolve(&tenant).unwrap();

        let config = RouterConfig::new()
            .with_tenant("acme", ConnectionDescriptor::in_memory())
            .with_tenant("globex", ConnectionDescriptor::in_memory());
        router.reload(config).unwrap();

        let after = router.resolve(&tenant).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(router.knows(&TenantId::new("globex")));
    }

    #[test]
    fn test_reload_drops_removed_tenants() {
        let router = router_with("acme");
        router.reload(RouterConfig::new()).unwrap();
        assert!(!router.knows(&TenantId::new("acme")));
    }

    #[test]
    fn test_reload_replaces_changed_descriptor() {
        let router = router_with("acme");
        let tenant = TenantId::new("acme");
        let before = router.resolve(&tenant).unwrap();

        let changed = ConnectionDescriptor::in_memory().with_max_connections(3);
        router
            .reload(RouterConfig::new().with_tenant("acme", changed))
            .unwrap();

        let after = router.resolve(&tenant).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.descriptor().max_connections, 3);
    }

    #[tokio::test]
    async fn test_health_check() {
        let router = router_with("acme");
        router.health_check(&TenantId::new("acme")).await.unwrap();
    }

    #[test]
    fn test_stats_before_and_after_open() {
        let router = router_with("acme");
        let tenant = TenantId::new("acme");
        assert_eq!(router.stats(&tenant).unwrap(), None);

        router.resolve(&tenant).unwrap();
        let stats = router.stats(&tenant).unwrap().unwrap();
        assert!(stats.connections >= 1);
    }
}
