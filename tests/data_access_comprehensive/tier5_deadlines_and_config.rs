//! Tier 5: Deadlines and configuration

use crate::test_utils::*;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tideline::{
    BatchGetOutput, BatchGetRequest, CounterResetMode, KeyCondition, Page, QueryDescriptor,
    QueryRequest, RequestContext, ScanRequest, ShardedStoreOptions, Store, StoreResult, Tideline,
    TidelineConfig, TidelineError, UpdateOutcome, UpdateRequest,
};

/// A store whose calls never complete
struct HungStore;

#[async_trait]
impl Store for HungStore {
    async fn query(&self, _request: QueryRequest) -> StoreResult<Page> {
        std::future::pending().await
    }

    async fn scan(&self, _request: ScanRequest) -> StoreResult<Page> {
        std::future::pending().await
    }

    async fn batch_get(&self, _request: BatchGetRequest) -> StoreResult<BatchGetOutput> {
        std::future::pending().await
    }

    async fn conditional_update(&self, _request: UpdateRequest) -> StoreResult<UpdateOutcome> {
        std::future::pending().await
    }
}

fn hung(timeout_ms: u64) -> Tideline {
    let config = TidelineConfig {
        operation_timeout_ms: Some(timeout_ms),
        ..Default::default()
    };
    Tideline::new(Arc::new(HungStore), config).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_hung_query_times_out() {
    let db = hung(250);
    let descriptor = QueryDescriptor::new("t", KeyCondition::partition("pk", "a"));
    match db.query(&descriptor).await.unwrap_err() {
        TidelineError::Timeout {
            operation,
            timeout_ms,
        } => {
            assert_eq!(operation, "query");
            assert_eq!(timeout_ms, 250);
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_scan_and_counter_time_out() {
    let db = hung(100);
    assert!(db.scan_all("t").await.unwrap_err().is_retryable());
    assert!(matches!(
        db.increment_counter("k").await,
        Err(TidelineError::Timeout { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_hung_counter_degrades_error_response() {
    let db = hung(100);
    let ctx = RequestContext::new("GET", "h", "/", "req");
    let response = db.respond_error(&ctx, "Bad Request", 400, None).await;
    assert_eq!(response.status, 500);
    assert!(response.body.error_code.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_covers_backoff() {
    let store = store_with(ShardedStoreOptions::default());
    seed_readings(&store, "d1", 3);
    store.throttle_next_batches(3);
    let config = TidelineConfig {
        operation_timeout_ms: Some(500),
        ..Default::default()
    };
    let db = Tideline::new(store, config).unwrap();
    let keys: Vec<_> = (0..3).map(|ts| reading_key("d1", ts)).collect();
    let table = tideline::TableRef::new(DEVICES, tideline::KeySchema::composite("device", "ts"));
    // backoff alone is 200 + 400 + 800ms
    assert!(matches!(
        db.batch_get_all(&table, &[], &keys).await,
        Err(TidelineError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_no_deadline_when_disabled() {
    let store = store_with(ShardedStoreOptions::default());
    seed_readings(&store, "d1", 1);
    let config = TidelineConfig {
        operation_timeout_ms: None,
        ..Default::default()
    };
    let db = Tideline::new(store, config).unwrap();
    let descriptor = QueryDescriptor::new(DEVICES, KeyCondition::partition("device", "d1"));
    assert_eq!(db.query(&descriptor).await.unwrap().unwrap().len(), 1);
}

#[tokio::test]
async fn test_config_file_drives_components() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        operation_timeout_ms = 5000

        [counter]
        max = 5
        reset_mode = "rearm"
        "#
    )
    .unwrap();

    let store = store_with(ShardedStoreOptions::default());
    seed_counter(&store, "k", 4);
    let db = Tideline::from_config_file(store, file.path()).unwrap();
    assert_eq!(db.config().counter.reset_mode, CounterResetMode::Rearm);
    assert_eq!(db.increment_counter("k").await.unwrap(), 5);
    assert_eq!(db.increment_counter("k").await.unwrap(), 1);
    assert_eq!(db.increment_counter("k").await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_in_file_disables_deadline() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "operation_timeout_ms = 0").unwrap();
    let db = Tideline::from_config_file(Arc::new(HungStore), file.path()).unwrap();
    let descriptor = QueryDescriptor::new("t", KeyCondition::partition("pk", "a"));
    let outcome =
        tokio::time::timeout(std::time::Duration::from_secs(60), db.query(&descriptor)).await;
    // still pending after a minute: no facade deadline fired
    assert!(outcome.is_err());
}

#[test]
fn test_invalid_config_file_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[batch]\nid_delimiter = \"\"").unwrap();
    let store = store_with(ShardedStoreOptions::default());
    let err = Tideline::from_config_file(store, file.path()).unwrap_err();
    assert!(matches!(err, TidelineError::Config { .. }));
}
