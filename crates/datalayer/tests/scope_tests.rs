//! Scope lifecycle: commit visibility, rollback invisibility, savepoint
//! batch policy, and pool behavior under contention.

mod common;

use common::{count_accounts, harness, harness_with, init_accounts};

use helios_datalayer::bind;
use helios_datalayer::error::DataError;
use helios_datalayer::executor::BatchItem;
use helios_datalayer::outcome::OperationOutcome;
use helios_datalayer::scope::{ScopeState, TransactionScope};
use helios_datalayer::tenant::TenantId;

async fn insert_account(scope: &TransactionScope, code: &str) -> helios_datalayer::DataResult<u64> {
    scope
        .execute(
            "INSERT INTO accounts (code, balance) VALUES (?, ?)",
            &bind![code, "0"],
        )
        .await
}

#[tokio::test]
async fn test_committed_write_visible_to_new_scope() {
    let h = harness(&["acme"]);
    let tenant = TenantId::new("acme");
    init_accounts(&h.coordinator, &tenant).await;

    let mut scope = h.coordinator.begin(&tenant).await.unwrap();
    insert_account(&scope, "ACC-1").await.unwrap();
    scope.commit().await.unwrap();

    assert_eq!(count_accounts(&h.coordinator, &tenant).await, 1);
}

#[tokio::test]
async fn test_rolled_back_write_leaves_no_trace() {
    let h = harness(&["acme"]);
    let tenant = TenantId::new("acme");
    init_accounts(&h.coordinator, &tenant).await;

    let mut scope = h.coordinator.begin(&tenant).await.unwrap();
    insert_account(&scope, "ACC-1").await.unwrap();
    scope.rollback().await.unwrap();
    assert_eq!(scope.state(), ScopeState::RolledBack);

    assert_eq!(count_accounts(&h.coordinator, &tenant).await, 0);
}

#[tokio::test]
async fn test_dropped_scope_rolls_back() {
    let h = harness(&["acme"]);
    let tenant = TenantId::new("acme");
    init_accounts(&h.coordinator, &tenant).await;

    {
        let scope = h.coordinator.begin(&tenant).await.unwrap();
        insert_account(&scope, "ACC-1").await.unwrap();
        // Dropped without commit or rollback.
    }

    assert_eq!(count_accounts(&h.coordinator, &tenant).await, 0);
}

#[tokio::test]
async fn test_duplicate_unique_key_outcome_and_rollback() {
    let h = harness(&["acme"]);
    let tenant = TenantId::new("acme");
    init_accounts(&h.coordinator, &tenant).await;

    h.coordinator
        .with_scope(&tenant, async |scope| {
            insert_account(scope, "ACC-1").await?;
            Ok(())
        })
        .await
        .unwrap();

    // Second insert with the same code inside its own scope.
    let mut scope = h.coordinator.begin(&tenant).await.unwrap();
    let result = insert_account(&scope, "ACC-1").await;
    let outcome = OperationOutcome::capture(result).unwrap();
    assert!(!outcome.succeeded);
    assert_eq!(outcome.code, "UniqueConstraintViolation");
    assert!(!outcome.retryable);
    scope.rollback().await.unwrap();

    // Only the original row remains.
    assert_eq!(count_accounts(&h.coordinator, &tenant).await, 1);
}

#[tokio::test]
async fn test_savepoint_rewinds_only_later_work() {
    let h = harness(&["acme"]);
    let tenant = TenantId::new("acme");
    init_accounts(&h.coordinator, &tenant).await;

    let mut scope = h.coordinator.begin(&tenant).await.unwrap();
    insert_account(&scope, "BEFORE").await.unwrap();

    let savepoint = scope.savepoint().await.unwrap();
    insert_account(&scope, "AFTER").await.unwrap();
    scope.rollback_to(&savepoint).await.unwrap();
    scope.release(savepoint).await.unwrap();

    scope.commit().await.unwrap();

    let codes = h
        .coordinator
        .with_scope(&tenant, async |scope| {
            scope
                .query("SELECT code FROM accounts ORDER BY code", &[], |row| {
                    row.get::<String>("code")
                })
                .await
        })
        .await
        .unwrap();
    assert_eq!(codes, vec!["BEFORE".to_string()]);
}

#[tokio::test]
async fn test_batch_optional_item_is_skipped_and_recorded() {
    let h = harness(&["acme"]);
    let tenant = TenantId::new("acme");
    init_accounts(&h.coordinator, &tenant).await;

    // Seed a row that makes item "b" collide on the unique code.
    h.coordinator
        .with_scope(&tenant, async |scope| {
            insert_account(scope, "b").await?;
            Ok(())
        })
        .await
        .unwrap();

    let items: Vec<BatchItem<String>> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|code| BatchItem::optional(*code, code.to_string()))
        .collect();

    let mut scope = h.coordinator.begin(&tenant).await.unwrap();
    let report = scope
        .apply_batch(&items, async |scope, code| {
            insert_account(scope, code).await.map(|_| ())
        })
        .await
        .unwrap();
    scope.commit().await.unwrap();

    assert_eq!(report.applied, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].label, "b");
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(report.failures[0].code, "UniqueConstraintViolation");

    // Every item except "b" landed (plus the seed row).
    assert_eq!(count_accounts(&h.coordinator, &tenant).await, 5);
}

#[tokio::test]
async fn test_batch_required_item_aborts_whole_scope() {
    let h = harness(&["acme"]);
    let tenant = TenantId::new("acme");
    init_accounts(&h.coordinator, &tenant).await;

    h.coordinator
        .with_scope(&tenant, async |scope| {
            insert_account(scope, "b").await?;
            Ok(())
        })
        .await
        .unwrap();

    let items = vec![
        BatchItem::optional("a", "a".to_string()),
        BatchItem::required("b", "b".to_string()),
        BatchItem::optional("c", "c".to_string()),
    ];

    let mut scope = h.coordinator.begin(&tenant).await.unwrap();
    let err = scope
        .apply_batch(&items, async |scope, code| {
            insert_account(scope, code).await.map(|_| ())
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UniqueConstraintViolation");
    assert_eq!(scope.state(), ScopeState::RolledBack);

    // Nothing from the batch survived, only the seed row.
    assert_eq!(count_accounts(&h.coordinator, &tenant).await, 1);
}

#[tokio::test]
async fn test_pool_exhaustion_is_retryable_connectivity_failure() {
    let h = harness_with(&["acme"], |d| {
        d.with_max_connections(1)
            .with_min_connections(1)
            .with_acquire_timeout_ms(100)
    });
    let tenant = TenantId::new("acme");
    init_accounts(&h.coordinator, &tenant).await;

    let _held = h.coordinator.begin(&tenant).await.unwrap();
    let err = h.coordinator.begin(&tenant).await.unwrap_err();
    assert_eq!(err.code(), "ConnectivityFailure");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_statement_after_commit_is_programming_error() {
    let h = harness(&["acme"]);
    let tenant = TenantId::new("acme");
    init_accounts(&h.coordinator, &tenant).await;

    let mut scope = h.coordinator.begin(&tenant).await.unwrap();
    scope.commit().await.unwrap();

    let err = insert_account(&scope, "LATE").await.unwrap_err();
    assert!(matches!(err, DataError::InvalidScopeState { .. }));
    assert!(err.is_programming());
}
