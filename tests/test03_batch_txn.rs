use std::sync::Arc;
use std::time::Duration;

use sql_conduit::prelude::*;
use sql_conduit::test_utils::MemoryDriver;

fn setup(driver: &MemoryDriver) -> Result<PoolRegistry, SqlConduitError> {
    let settings = ConduitSettings {
        log_enable: false,
        ..ConduitSettings::default()
    };
    PoolRegistry::new(Arc::new(driver.clone()), settings)
}

fn pool_config() -> PoolConfig {
    PoolConfig {
        pool_min: 0,
        pool_max: 2,
        queue_timeout: Duration::from_millis(500),
        ..PoolConfig::default()
    }
}

fn insert(table: &str, id: i64) -> QueryAndParams {
    QueryAndParams::new(
        format!("INSERT INTO {table} (id) VALUES (:id)"),
        BindParams::from([("id".to_string(), SqlValue::Int(id))]),
    )
}

/// Journal without connection churn, for ordering assertions.
fn statement_events(driver: &MemoryDriver) -> Vec<String> {
    driver
        .journal()
        .into_iter()
        .filter(|e| e != "connect" && e != "close")
        .collect()
}

#[tokio::test]
async fn successful_batch_commits_once_after_all_statements() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new();
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    let batch = vec![
        insert("orders", 1),
        insert("orders", 2),
        insert("orders", 3),
    ];
    let entries = registry
        .execute_batch(&batch, None, &ExecOptions::default())
        .await?;

    assert_eq!(entries.len(), 3);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.index, i);
        assert_eq!(entry.result.rows_affected, 1);
    }
    assert_eq!(driver.table_rows("orders"), 3);
    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rollback_count(), 0);

    // Strict order: three executes, then exactly one commit, nothing after.
    let events = statement_events(&driver);
    assert_eq!(events.len(), 4);
    assert!(events[0].contains(":id") && events[0].starts_with("exec:"));
    assert!(events[1].starts_with("exec:"));
    assert!(events[2].starts_with("exec:"));
    assert_eq!(events[3], "commit");
    Ok(())
}

#[tokio::test]
async fn failure_rolls_back_and_stops_the_batch() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new().fail_matching("bad");
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    let batch = vec![
        insert("t", 1),
        QueryAndParams::new_without_params("INSERT INTO t VALUES(bad)"),
        insert("t", 3),
    ];
    let err = registry
        .execute_batch(&batch, None, &ExecOptions::default())
        .await
        .unwrap_err();

    match err {
        SqlConduitError::Transaction {
            failed_index,
            message,
        } => {
            assert_eq!(failed_index, 1);
            assert!(message.contains("simulated failure"));
        }
        other => panic!("expected Transaction error, got {other:?}"),
    }

    // All-or-nothing: the first insert was rolled back, the third never ran.
    assert_eq!(driver.table_rows("t"), 0);
    assert_eq!(driver.commit_count(), 0);
    assert_eq!(driver.rollback_count(), 1);

    let events = statement_events(&driver);
    assert_eq!(events.len(), 3);
    assert!(events[0].starts_with("exec:INSERT INTO t (id)"));
    assert_eq!(events[1], "exec:INSERT INTO t VALUES(bad)");
    assert_eq!(events[2], "rollback");

    // The pool is intact for the next caller.
    assert_eq!(registry.stats(None)?.in_use, 0);
    Ok(())
}

#[tokio::test]
async fn failure_at_first_statement() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new().fail_matching("bad");
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    let batch = vec![
        QueryAndParams::new_without_params("INSERT INTO t VALUES(bad)"),
        insert("t", 2),
    ];
    let err = registry
        .execute_batch(&batch, None, &ExecOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SqlConduitError::Transaction { failed_index: 0, .. }
    ));
    assert_eq!(driver.table_rows("t"), 0);
    assert_eq!(driver.rollback_count(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_batch_short_circuits_without_a_connection() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new();
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    let entries = registry
        .execute_batch(&[], None, &ExecOptions::default())
        .await?;
    assert!(entries.is_empty());
    assert_eq!(driver.connect_count(), 0);
    assert_eq!(driver.commit_count(), 0);
    Ok(())
}

#[tokio::test]
async fn batch_results_are_readable_per_statement() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new();
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    let batch = vec![
        insert("inventory", 10),
        QueryAndParams::new_without_params("SELECT * FROM inventory"),
    ];
    let entries = registry
        .execute_batch(&batch, None, &ExecOptions::default())
        .await?;

    // The select runs inside the same transaction and sees the staged row.
    assert_eq!(entries[1].index, 1);
    assert_eq!(entries[1].result.rows.len(), 1);
    assert_eq!(
        entries[1].result.rows[0].get("ID").unwrap().as_int(),
        Some(&10)
    );
    Ok(())
}
