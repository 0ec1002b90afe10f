//! Tier 1: Retrieval

use crate::test_utils::*;
use serde_json::json;
use tideline::{item, KeyCondition, QueryDescriptor, ShardedStoreOptions, SortCondition};

fn paged() -> ShardedStoreOptions {
    ShardedStoreOptions {
        page_limit: Some(4),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_recursive_query_preserves_store_order() {
    let store = store_with(paged());
    seed_readings(&store, "d1", 10);
    seed_readings(&store, "d2", 3);
    let db = facade(&store);

    let descriptor =
        QueryDescriptor::new(DEVICES, KeyCondition::partition("device", "d1")).recursive(true);
    let items = db.query(&descriptor).await.unwrap().unwrap();
    let ts: Vec<_> = items.iter().map(|i| i["ts"].as_i64().unwrap()).collect();
    assert_eq!(ts, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_single_page_query() {
    let store = store_with(paged());
    seed_readings(&store, "d1", 10);
    let db = facade(&store);
    let descriptor = QueryDescriptor::new(DEVICES, KeyCondition::partition("device", "d1"));
    assert_eq!(db.query(&descriptor).await.unwrap().unwrap().len(), 4);
}

#[tokio::test]
async fn test_empty_first_page_is_none_for_both_modes() {
    let store = store_with(paged());
    let db = facade(&store);
    for recursive in [false, true] {
        let descriptor = QueryDescriptor::new(DEVICES, KeyCondition::partition("device", "ghost"))
            .recursive(recursive);
        assert!(db.query(&descriptor).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_sort_condition_narrows_results() {
    let store = store_with(ShardedStoreOptions::default());
    seed_readings(&store, "d1", 10);
    let db = facade(&store);
    let condition = KeyCondition::partition("device", "d1").with_sort(
        "ts",
        SortCondition::Compare {
            op: tideline::CompareOp::Ge,
            value: json!(7),
        },
    );
    let items = db
        .query(&QueryDescriptor::new(DEVICES, condition).recursive(true))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn test_invalid_descriptor_makes_no_store_call() {
    let store = store_with(ShardedStoreOptions::default());
    let db = facade(&store);
    let descriptor = QueryDescriptor::new("", KeyCondition::partition("device", "d1"));
    assert!(db.query(&descriptor).await.unwrap_err().is_invalid_input());
    assert_eq!(store.stats().total(), 0);
}

#[tokio::test]
async fn test_pages_stream_matches_recursive_query() {
    let store = store_with(paged());
    seed_readings(&store, "d1", 9);
    let db = facade(&store);
    let descriptor = QueryDescriptor::new(DEVICES, KeyCondition::partition("device", "d1"));

    let mut pages = db.pages(descriptor.clone()).unwrap();
    let mut streamed = Vec::new();
    let mut sizes = Vec::new();
    while let Some(page) = pages.next_page().await.unwrap() {
        sizes.push(page.len());
        streamed.extend(page);
    }
    assert_eq!(sizes, vec![4, 4, 1]);

    let drained = db
        .query(&descriptor.recursive(true))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(streamed, drained);
}

#[tokio::test]
async fn test_scan_all_is_idempotent() {
    let store = store_with(paged());
    seed_readings(&store, "d1", 6);
    seed_readings(&store, "d2", 5);
    let db = facade(&store);

    let first = db.scan_all(DEVICES).await.unwrap();
    let second = db.scan_all(DEVICES).await.unwrap();
    assert_eq!(first.len(), 11);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_scan_all_missing_table_returns_no_partial_results() {
    let store = store_with(ShardedStoreOptions::default());
    let db = facade(&store);
    assert!(db.scan_all("unknown").await.is_err());
}

#[tokio::test]
async fn test_messages_between_decodes_payloads() {
    let store = store_with(paged());
    for ts in [100, 200, 300, 400, 500, 600] {
        store
            .put_item(
                "messages",
                item([
                    ("compositeId", json!("org-1#veh-9")),
                    ("ts", json!(ts)),
                    ("actual_payload", json!(format!(r#"{{"speed":{}}}"#, ts / 10))),
                ]),
            )
            .unwrap();
    }
    let db = facade(&store);
    let items = db
        .messages_between("org-1#veh-9", 200, 500, Some(2))
        .await
        .unwrap();
    let speeds: Vec<_> = items
        .iter()
        .map(|i| i["actual_payload"]["speed"].as_i64().unwrap())
        .collect();
    assert_eq!(speeds, vec![20, 30, 40, 50]);
}
