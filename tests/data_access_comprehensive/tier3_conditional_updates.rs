//! Tier 3: Conditional updates

use crate::test_utils::*;
use serde_json::json;
use tideline::{Message, Reply, ShardedStoreOptions};

#[tokio::test]
async fn test_counter_increments_and_resets() {
    let store = store_with(ShardedStoreOptions::default());
    seed_counter(&store, "req-1-Tile", 997);
    let db = facade(&store);
    assert_eq!(db.increment_counter("req-1-Tile").await.unwrap(), 998);
    assert_eq!(db.increment_counter("req-1-Tile").await.unwrap(), 999);
    assert_eq!(db.increment_counter("req-1-Tile").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_counter_callers_see_distinct_values() {
    let store = store_with(ShardedStoreOptions::default());
    seed_counter(&store, "hot", 0);
    let db = facade(&store);

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move { db.increment_counter("hot").await.unwrap() })
        })
        .collect();
    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap());
    }
    values.sort_unstable();
    assert_eq!(values, (1..=40).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_reply_claimed_once() {
    let store = store_with(ShardedStoreOptions::default());
    let db = facade(&store);
    let message = Message {
        id: "job-7".into(),
        body: json!({"stop": 3}),
    };
    assert!(db.arm_reply(&message, "ack-1", 1_000).await.unwrap());

    let first = Reply {
        id: "ack-1".into(),
        timestamp: 2_000,
    };
    let later = Reply {
        id: "ack-1".into(),
        timestamp: 3_000,
    };
    let forwarded = db.register_reply(&message, &first).await.unwrap().unwrap();
    assert_eq!(forwarded["id"], json!("job-7"));
    assert!(db.register_reply(&message, &later).await.unwrap().is_none());
    assert!(db.register_reply(&message, &first).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_concurrent_claims_exactly_one_wins() {
    let store = store_with(ShardedStoreOptions::default());
    let db = facade(&store);
    let message = Message {
        id: "job-8".into(),
        body: json!(null),
    };
    db.arm_reply(&message, "ack", 0).await.unwrap();

    let a = {
        let (db, message) = (db.clone(), message.clone());
        tokio::spawn(async move {
            let reply = Reply {
                id: "ack".into(),
                timestamp: 10,
            };
            db.register_reply(&message, &reply).await.unwrap()
        })
    };
    let b = {
        let (db, message) = (db.clone(), message.clone());
        tokio::spawn(async move {
            let reply = Reply {
                id: "ack".into(),
                timestamp: 20,
            };
            db.register_reply(&message, &reply).await.unwrap()
        })
    };
    let claims = [a.await.unwrap(), b.await.unwrap()];
    assert_eq!(claims.iter().filter(|c| c.is_some()).count(), 1);
}

#[tokio::test]
async fn test_unarmed_reply_is_absent_not_error() {
    let store = store_with(ShardedStoreOptions::default());
    let db = facade(&store);
    let message = Message {
        id: "m".into(),
        body: json!({}),
    };
    let reply = Reply {
        id: "r".into(),
        timestamp: 1,
    };
    assert!(db.register_reply(&message, &reply).await.unwrap().is_none());
}
