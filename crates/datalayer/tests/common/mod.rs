//! Shared harness for the integration suite.
//!
//! Each test gets file-backed databases in a temp directory, one per
//! tenant, so separate scopes against the same tenant observe the same
//! database (as in production).

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use helios_datalayer::config::{ConnectionDescriptor, RouterConfig};
use helios_datalayer::router::ConnectionRouter;
use helios_datalayer::scope::TransactionCoordinator;
use helios_datalayer::tenant::TenantId;

/// A coordinator over temp-file tenant databases.
pub struct TestHarness {
    pub coordinator: TransactionCoordinator,
    // Keeps the database files alive for the duration of the test.
    _dir: TempDir,
}

/// Builds a harness with one database per tenant code.
pub fn harness(tenants: &[&str]) -> TestHarness {
    harness_with(tenants, |d| d)
}

/// Builds a harness, letting the test adjust each descriptor.
pub fn harness_with(
    tenants: &[&str],
    adjust: impl Fn(ConnectionDescriptor) -> ConnectionDescriptor,
) -> TestHarness {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let mut config = RouterConfig::new();
    for code in tenants {
        let path = dir.path().join(format!("{code}.db"));
        let descriptor = adjust(
            ConnectionDescriptor::new(path.to_string_lossy().into_owned())
                .with_max_connections(4)
                .with_acquire_timeout_ms(2_000),
        );
        config = config.with_tenant(*code, descriptor);
    }
    let router = Arc::new(ConnectionRouter::new(config).expect("router config rejected"));
    TestHarness {
        coordinator: TransactionCoordinator::new(router),
        _dir: dir,
    }
}

/// A small accounts table exercising every extractable type.
pub const ACCOUNTS_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    balance TEXT NOT NULL DEFAULT '0',
    active INTEGER NOT NULL DEFAULT 1,
    opened_at TEXT,
    note TEXT
)";

/// A two-table ledger whose foreign key is checked at commit time.
pub const LEDGER_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS batches (id INTEGER PRIMARY KEY)",
    "CREATE TABLE IF NOT EXISTS entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id INTEGER NOT NULL REFERENCES batches(id) DEFERRABLE INITIALLY DEFERRED,
        amount TEXT NOT NULL
    )",
];

/// Creates the accounts table for a tenant.
pub async fn init_accounts(coordinator: &TransactionCoordinator, tenant: &TenantId) {
    coordinator
        .with_scope(tenant, async |scope| {
            scope.execute(ACCOUNTS_SCHEMA, &[]).await?;
            Ok(())
        })
        .await
        .expect("schema setup failed");
}

/// Creates the ledger tables for a tenant.
pub async fn init_ledger(coordinator: &TransactionCoordinator, tenant: &TenantId) {
    coordinator
        .with_scope(tenant, async |scope| {
            for statement in LEDGER_SCHEMA {
                scope.execute(statement, &[]).await?;
            }
            Ok(())
        })
        .await
        .expect("schema setup failed");
}

/// Counts accounts visible in a fresh scope.
pub async fn count_accounts(coordinator: &TransactionCoordinator, tenant: &TenantId) -> i64 {
    coordinator
        .with_scope(tenant, async |scope| {
            let rows = scope
                .query("SELECT COUNT(*) AS n FROM accounts", &[], |row| {
                    row.get::<i64>("n")
                })
                .await?;
            Ok(rows[0])
        })
        .await
        .expect("count failed")
}
