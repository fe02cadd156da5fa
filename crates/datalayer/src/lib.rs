//! Helios Data Layer
//!
//! A multi-tenant relational data access layer: each logical operation is
//! routed to the correct tenant's database, runs inside a properly scoped
//! transaction (including joint scopes touching two tenant databases at
//! once), extracts typed values safely from result rows, classifies
//! low-level storage errors into a stable business-facing taxonomy, and
//! runs best-effort side effects (audit, change notification) only after a
//! successful commit.
//!
//! # Architecture
//!
//! - [`tenant`] - Opaque tenant identifiers
//! - [`config`] - Connection descriptors and the tenant map
//! - [`router`] - Tenant resolution and per-tenant connection pools
//! - [`scope`] - Transaction scopes, savepoints, and the coordinator
//! - [`executor`] - Typed statement execution (reads, writes, paging, batches)
//! - [`row`] - Null-aware typed row extraction
//! - [`classify`] - The closed error taxonomy
//! - [`outcome`] - Structured outcomes for write operations
//! - [`hooks`] - Post-commit audit and notification pipeline
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use helios_datalayer::bind;
//! use helios_datalayer::config::{ConnectionDescriptor, RouterConfig};
//! use helios_datalayer::router::ConnectionRouter;
//! use helios_datalayer::scope::TransactionCoordinator;
//! use helios_datalayer::tenant::TenantId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Tenant map, typically deserialized from external configuration.
//! let config = RouterConfig::new()
//!     .with_tenant("acme", ConnectionDescriptor::new("/data/acme.db"))
//!     .with_tenant("globex", ConnectionDescriptor::new("/data/globex.db"));
//!
//! let router = Arc::new(ConnectionRouter::new(config)?);
//! let coordinator = TransactionCoordinator::new(router);
//!
//! // One scope per logical operation; statements are always parameterized.
//! let mut scope = coordinator.begin(&TenantId::new("acme")).await?;
//! scope
//!     .execute(
//!         "INSERT INTO accounts (code, balance) VALUES (?, ?)",
//!         &bind!["ACC-1", "125.00"],
//!     )
//!     .await?;
//! scope.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error policy
//!
//! Expected business failures (constraint violations) fold into
//! [`OperationOutcome`](outcome::OperationOutcome)s; infrastructure
//! failures are marked retryable for the caller (this layer performs no
//! automatic retry); programming errors propagate loudly. See
//! [`error`] and [`classify`].
//!
//! # Joint scopes
//!
//! [`begin_multi`](scope::TransactionCoordinator::begin_multi) binds one
//! transaction per tenant under a single scope handle and commits them
//! sequentially. This is a best-effort joint commit, not two-phase commit:
//! a crash or failure between the commits can leave one tenant's database
//! committed and the other rolled back, surfaced as
//! [`PartialCommitFailure`](error::DataError::PartialCommitFailure).

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod classify;
pub mod config;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod outcome;
pub mod router;
pub mod row;
pub mod scope;
pub mod tenant;

// Re-export commonly used types at crate root
pub use classify::{Classification, ErrorKind, classify};
pub use config::{ConnectionDescriptor, RouterConfig};
pub use error::{DataError, DataResult};
pub use executor::{BatchItem, BatchReport, PagedResult, ResultSets, SqlParam};
pub use outcome::OperationOutcome;
pub use router::ConnectionRouter;
pub use row::ResultRow;
pub use scope::{
    ChangeRecord, CommitSummary, EntityRef, ScopeOptions, TransactionCoordinator, TransactionScope,
};
pub use tenant::TenantId;

// Re-export the hook surface
pub use hooks::{HookPipeline, PostCommitHook};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
