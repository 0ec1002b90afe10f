//! Tier 2: Bounded batch fetch

use crate::test_utils::*;
use std::time::Duration;
use tideline::{backoff_delay, KeySchema, ShardedStoreOptions, TableRef, TidelineError};
use tokio::time::Instant;

fn devices() -> TableRef {
    TableRef::new(DEVICES, KeySchema::composite("device", "ts"))
}

#[tokio::test]
async fn test_empty_keys_return_immediately() {
    let store = store_with(ShardedStoreOptions::default());
    let db = facade(&store);
    let ids = db.batch_get_all(&devices(), &[], &[]).await.unwrap();
    assert!(ids.is_empty());
    assert_eq!(store.stats().total(), 0);
}

#[tokio::test]
async fn test_large_key_set_is_windowed() {
    let store = store_with(ShardedStoreOptions::default());
    seed_readings(&store, "d1", 320);
    let db = facade(&store);
    let keys: Vec<_> = (0..320).map(|ts| reading_key("d1", ts)).collect();
    let ids = db
        .batch_get_all(&devices(), &["reading".to_string()], &keys)
        .await
        .unwrap();
    assert_eq!(ids.len(), 320);
    assert_eq!(ids[0], "d1#0");
    assert_eq!(ids[319], "d1#319");
    assert_eq!(store.stats().batch_gets(), 4);
}

#[tokio::test]
async fn test_missing_keys_are_absent() {
    let store = store_with(ShardedStoreOptions::default());
    seed_readings(&store, "d1", 2);
    let db = facade(&store);
    let keys = vec![reading_key("d1", 0), reading_key("d9", 0), reading_key("d1", 1)];
    let ids = db.batch_get_all(&devices(), &[], &keys).await.unwrap();
    assert_eq!(ids, vec!["d1#0", "d1#1"]);
}

#[tokio::test(start_paused = true)]
async fn test_partial_capacity_recovers_with_backoff() {
    let store = store_with(ShardedStoreOptions {
        batch_capacity: Some(70),
        ..Default::default()
    });
    seed_readings(&store, "d1", 120);
    let db = facade(&store);
    let keys: Vec<_> = (0..120).map(|ts| reading_key("d1", ts)).collect();

    let start = Instant::now();
    let ids = db.batch_get_all(&devices(), &[], &keys).await.unwrap();
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 120);
    // rounds: 100 -> 30 left; 30 + 20 new -> done
    assert_eq!(store.stats().batch_gets(), 2);
    assert!(start.elapsed() >= backoff_delay(100, 1));
}

#[tokio::test(start_paused = true)]
async fn test_retry_ceiling_reports_table() {
    let store = store_with(ShardedStoreOptions::default());
    seed_readings(&store, "d1", 5);
    store.throttle_next_batches(u32::MAX);
    let db = facade(&store);
    let keys: Vec<_> = (0..5).map(|ts| reading_key("d1", ts)).collect();

    let err = db.batch_get_all(&devices(), &[], &keys).await.unwrap_err();
    assert!(err.is_capacity());
    assert!(!err.is_retryable());
    match err {
        TidelineError::RetryCeilingExceeded { table, retries, .. } => {
            assert_eq!(table, DEVICES);
            assert_eq!(retries, 4);
        }
        other => panic!("expected RetryCeilingExceeded, got {:?}", other),
    }
}

#[test]
fn test_backoff_schedule() {
    for retry in 0..=3 {
        assert_eq!(
            backoff_delay(100, retry),
            Duration::from_millis(100 * 2u64.pow(retry))
        );
    }
}
