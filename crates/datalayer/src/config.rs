//! Router configuration types.
//!
//! The mapping from tenant identifier to connection descriptor is supplied
//! by an external configuration or service-discovery component; this module
//! only defines the shape it deserializes into. How the configuration is
//! loaded (file, environment, discovery service) is the caller's business.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Resolved addressing information for one tenant's database.
///
/// Descriptors are cached by the router for the lifetime of the process and
/// replaced only by an explicit configuration reload.
///
/// # Example
///
/// ```
/// use helios_datalayer::config::ConnectionDescriptor;
///
/// let descriptor = ConnectionDescriptor::new("/var/lib/app/acme.db")
///     .with_max_connections(16)
///     .with_acquire_timeout_ms(5_000);
/// assert_eq!(descriptor.max_connections, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Path or address of the tenant's database. `:memory:` opens a private
    /// in-memory database (useful in tests).
    pub database: String,

    /// Optional user credential. Unused by engines that authenticate
    /// through the filesystem, carried for engines that do not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Optional password credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Maximum number of concurrently open connections in the tenant's pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections the pool keeps warm.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long an acquiring call blocks on an exhausted pool before it
    /// fails with a retryable connectivity error.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Engine busy timeout applied to every connection.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Enable foreign key enforcement on every connection.
    #[serde(default = "default_true")]
    pub enforce_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl ConnectionDescriptor {
    /// Creates a descriptor for the given database path with defaults.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            user: None,
            password: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enforce_foreign_keys: true,
        }
    }

    /// Creates a descriptor for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    /// Sets credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the pool's maximum connection count.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the pool's minimum idle connection count.
    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the pool acquisition timeout.
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Sets the engine busy timeout.
    pub fn with_busy_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }

    /// Returns whether this descriptor points at an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.database == ":memory:"
    }
}

/// The tenant map consumed by the [`ConnectionRouter`](crate::router::ConnectionRouter).
///
/// Deserializable so callers can feed it from whatever configuration source
/// they use:
///
/// ```
/// use helios_datalayer::config::RouterConfig;
///
/// let config: RouterConfig = serde_json::from_str(r#"{
///     "tenants": {
///         "acme":  { "database": "/data/acme.db" },
///         "globex": { "database": "/data/globex.db", "max_connections": 4 }
///     }
/// }"#).unwrap();
/// assert_eq!(config.tenants.len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Tenant code to connection descriptor.
    #[serde(default)]
    pub tenants: HashMap<String, ConnectionDescriptor>,

    /// Pattern tenant codes must match. Codes that fail the pattern are
    /// rejected when the router is constructed or reloaded.
    #[serde(default = "default_tenant_pattern")]
    pub tenant_pattern: String,
}

fn default_tenant_pattern() -> String {
    r"^[A-Za-z][A-Za-z0-9_-]*$".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Creates an empty configuration with the default tenant pattern.
    pub fn new() -> Self {
        Self {
            tenants: HashMap::new(),
            tenant_pattern: default_tenant_pattern(),
        }
    }

    /// Adds a tenant descriptor.
    pub fn with_tenant(
        mut self,
        code: impl Into<String>,
        descriptor: ConnectionDescriptor,
    ) -> Self {
        self.tenants.insert(code.into(), descriptor);
        self
    }
}
