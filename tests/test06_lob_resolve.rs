use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sql_conduit::prelude::*;
use sql_conduit::test_utils::MemoryDriver;

fn content_row(content: SqlValue) -> ExecResult {
    let columns = Arc::new(vec!["ID".to_string(), "CONTENT".to_string()]);
    let mut result = ExecResult::default();
    result.add_row(columns, vec![SqlValue::Int(1), content]);
    result
}

#[tokio::test]
async fn stream_resolves_to_full_text() -> Result<(), SqlConduitError> {
    let handle = LobHandle::from_chunks(["hello ".to_string(), "world".to_string()]);
    let resolved = resolve_lob_columns(content_row(SqlValue::Lob(handle)), &["CONTENT"]).await?;
    assert_eq!(
        resolved.rows[0].get("CONTENT").unwrap().as_text(),
        Some("hello world")
    );
    Ok(())
}

#[tokio::test]
async fn null_resolves_to_null() -> Result<(), SqlConduitError> {
    let resolved = resolve_lob_columns(content_row(SqlValue::Null), &["CONTENT"]).await?;
    assert!(resolved.rows[0].get("CONTENT").unwrap().is_null());
    Ok(())
}

#[tokio::test]
async fn missing_column_fails_the_whole_resolve() {
    let err = resolve_lob_columns(content_row(SqlValue::Null), &["CONTENT", "BODY"])
        .await
        .unwrap_err();
    assert!(matches!(err, SqlConduitError::ColumnNotFound(col) if col == "BODY"));
}

#[tokio::test]
async fn column_match_is_case_insensitive() -> Result<(), SqlConduitError> {
    let handle = LobHandle::from_chunks(["text".to_string()]);
    let resolved = resolve_lob_columns(content_row(SqlValue::Lob(handle)), &["content"]).await?;
    assert_eq!(
        resolved.rows[0].get("CONTENT").unwrap().as_text(),
        Some("text")
    );
    Ok(())
}

#[tokio::test]
async fn many_rows_drain_and_release_their_streams() -> Result<(), SqlConduitError> {
    let released = Arc::new(AtomicUsize::new(0));
    let columns = Arc::new(vec!["CONTENT".to_string()]);
    let mut result = ExecResult::default();
    for i in 0..8 {
        let counter = released.clone();
        let handle = LobHandle::from_chunks([format!("chunk-{i}")])
            .on_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        result.add_row(columns.clone(), vec![SqlValue::Lob(handle)]);
    }

    let resolved = resolve_lob_columns(result, &["CONTENT"]).await?;
    assert_eq!(resolved.rows.len(), 8);
    for (i, row) in resolved.rows.iter().enumerate() {
        assert_eq!(
            row.get("CONTENT").unwrap().as_text(),
            Some(format!("chunk-{i}").as_str())
        );
    }
    assert_eq!(released.load(Ordering::SeqCst), 8);
    Ok(())
}

#[tokio::test]
async fn execute_with_lobs_passes_materialized_text_through()
-> Result<(), Box<dyn std::error::Error>> {
    let driver = MemoryDriver::new();
    let settings = ConduitSettings {
        log_enable: false,
        ..ConduitSettings::default()
    };
    let registry = PoolRegistry::new(Arc::new(driver.clone()), settings)?;
    registry
        .initialize(PoolConfig {
            pool_min: 0,
            pool_max: 2,
            queue_timeout: Duration::from_millis(500),
            ..PoolConfig::default()
        })
        .await?;

    registry
        .execute(
            "INSERT INTO blogs (id, content) VALUES (:id, :content)",
            &BindParams::from([
                ("id".to_string(), SqlValue::Int(1)),
                ("content".to_string(), SqlValue::Text("inline text".into())),
            ]),
            None,
            &ExecOptions::default(),
        )
        .await?;

    let result = registry
        .execute_with_lobs(
            "SELECT * FROM blogs",
            &BindParams::new(),
            &["CONTENT"],
            None,
            &ExecOptions::default(),
        )
        .await?;
    assert_eq!(
        result.rows[0].get("CONTENT").unwrap().as_text(),
        Some("inline text")
    );

    // A column the result set doesn't have aborts the resolve.
    let err = registry
        .execute_with_lobs(
            "SELECT * FROM blogs",
            &BindParams::new(),
            &["ATTACHMENT"],
            None,
            &ExecOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SqlConduitError::ColumnNotFound(_)));
    Ok(())
}
