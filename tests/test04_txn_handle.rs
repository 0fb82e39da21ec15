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

fn id_param(id: i64) -> BindParams {
    BindParams::from([("id".to_string(), SqlValue::Int(id))])
}

#[tokio::test]
async fn begin_execute_commit() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new();
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    let mut tx = registry.begin(None).await?;
    tx.execute("INSERT INTO events (id) VALUES (:id)", &id_param(1))
        .await?;
    tx.execute("INSERT INTO events (id) VALUES (:id)", &id_param(2))
        .await?;

    // Nothing visible before commit.
    assert_eq!(driver.table_rows("events"), 0);

    tx.commit().await?;
    assert_eq!(driver.table_rows("events"), 2);
    assert_eq!(driver.commit_count(), 1);
    assert_eq!(registry.stats(None)?.in_use, 0);
    Ok(())
}

#[tokio::test]
async fn rollback_discards_staged_writes() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new();
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    let mut tx = registry.begin(None).await?;
    tx.execute("INSERT INTO events (id) VALUES (:id)", &id_param(1))
        .await?;
    tx.rollback().await?;

    assert_eq!(driver.table_rows("events"), 0);
    assert_eq!(driver.rollback_count(), 1);
    assert_eq!(driver.commit_count(), 0);
    Ok(())
}

#[tokio::test]
async fn handle_is_invalid_after_terminal_operations() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new();
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    // After commit.
    let mut tx = registry.begin(None).await?;
    tx.execute("INSERT INTO a (id) VALUES (:id)", &id_param(1))
        .await?;
    tx.commit().await?;
    assert!(!tx.is_active());
    assert!(matches!(
        tx.execute("SELECT * FROM a", &BindParams::new()).await,
        Err(SqlConduitError::InvalidHandle(_))
    ));
    assert!(matches!(
        tx.commit().await,
        Err(SqlConduitError::InvalidHandle(_))
    ));

    // After rollback.
    let mut tx = registry.begin(None).await?;
    tx.rollback().await?;
    assert!(matches!(
        tx.execute("SELECT * FROM a", &BindParams::new()).await,
        Err(SqlConduitError::InvalidHandle(_))
    ));
    assert!(matches!(
        tx.rollback().await,
        Err(SqlConduitError::InvalidHandle(_))
    ));
    Ok(())
}

#[tokio::test]
async fn execute_failure_rolls_back_and_invalidates() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new().fail_matching("bad");
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    let mut tx = registry.begin(None).await?;
    tx.execute("INSERT INTO t (id) VALUES (:id)", &id_param(1))
        .await?;
    let err = tx
        .execute("INSERT INTO t VALUES(bad)", &BindParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlConduitError::Execution(_)));

    // The failure was terminal: rolled back, released, invalid.
    assert!(!tx.is_active());
    assert_eq!(driver.table_rows("t"), 0);
    assert_eq!(driver.rollback_count(), 1);
    assert_eq!(registry.stats(None)?.in_use, 0);
    assert!(matches!(
        tx.commit().await,
        Err(SqlConduitError::InvalidHandle(_))
    ));
    Ok(())
}

#[tokio::test]
async fn transaction_reads_its_own_staged_writes() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new();
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    let mut tx = registry.begin(None).await?;
    tx.execute("INSERT INTO notes (id) VALUES (:id)", &id_param(42))
        .await?;
    let seen = tx.execute("SELECT * FROM notes", &BindParams::new()).await?;
    assert_eq!(seen.rows.len(), 1);

    tx.rollback().await?;
    assert_eq!(driver.table_rows("notes"), 0);
    Ok(())
}

#[tokio::test]
async fn dropped_live_handle_rolls_back() -> Result<(), SqlConduitError> {
    let driver = MemoryDriver::new();
    let registry = setup(&driver)?;
    registry.initialize(pool_config()).await?;

    {
        let mut tx = registry.begin(None).await?;
        tx.execute("INSERT INTO t (id) VALUES (:id)", &id_param(1))
            .await?;
        // Dropped without commit or rollback.
    }

    // The drop-time rollback runs as a spawned task.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(driver.table_rows("t"), 0);
    assert_eq!(driver.rollback_count(), 1);
    assert_eq!(registry.stats(None)?.in_use, 0);
    Ok(())
}
