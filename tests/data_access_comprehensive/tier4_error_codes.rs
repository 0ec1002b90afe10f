//! Tier 4: Error codes and error responses

use crate::test_utils::*;
use serde_json::json;
use std::sync::Arc;
use tideline::{MemoryStore, RequestContext, ShardedStoreOptions, Tideline, TidelineConfig};

#[tokio::test]
async fn test_server_error_code() {
    let store = store_with(ShardedStoreOptions::default());
    let db = facade(&store);
    assert_eq!(
        db.build_error_code("Tile", 500, "req-1").await.unwrap(),
        "TL-0500"
    );
    assert_eq!(store.stats().updates(), 0);
}

#[tokio::test]
async fn test_unknown_service_code() {
    let store = store_with(ShardedStoreOptions::default());
    let db = facade(&store);
    assert_eq!(
        db.build_error_code("UnknownSvc", 403, "req-1").await.unwrap(),
        "NULL-0403"
    );
    assert_eq!(db.services().unknown_services(), vec!["UnknownSvc"]);
}

#[tokio::test]
async fn test_counter_derived_code() {
    let store = store_with(ShardedStoreOptions::default());
    seed_counter(&store, "req-5-Email", 6);
    let db = facade(&store);
    assert_eq!(
        db.build_error_code("Email", 399, "req-5").await.unwrap(),
        "EM-1007"
    );
}

#[tokio::test]
async fn test_configured_service_override() {
    let store = store_with(ShardedStoreOptions::default());
    let config = TidelineConfig::from_toml_str("[services]\n\"Billing\" = \"BL\"").unwrap();
    let db = Tideline::new(store, config).unwrap();
    assert_eq!(
        db.build_error_code("Billing", 502, "req").await.unwrap(),
        "BL-0502"
    );
}

#[tokio::test]
async fn test_error_response_carries_code() {
    let store = store_with(ShardedStoreOptions::default());
    seed_counter(&store, "req-2-Geocoding", 41);
    let db = facade(&store);
    let ctx = RequestContext::new("POST", "api.example.com", "/geocode", "req-2")
        .with_service("Geocoding");

    let response = db
        .respond_error(&ctx, "Missing Required Parameter address in body", 400, None)
        .await;
    assert_eq!(response.status, 400);
    let body = response.to_json();
    assert_eq!(body["error_code"], json!("GC-1042"));
    assert_eq!(body["error"]["data"], json!({"property": "address"}));
    assert_eq!(body["api_info"]["method"], json!("POST /geocode"));
}

#[tokio::test]
async fn test_error_response_degrades_when_catalog_missing() {
    // no tables at all: the counter's store call fails
    let db = Tideline::new(Arc::new(MemoryStore::new()), TidelineConfig::default()).unwrap();
    let ctx = RequestContext::new("GET", "h", "/x", "req-3");
    let response = db.respond_error(&ctx, "Bad Request", 400, None).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body.error.message, "Internal Server Error");
    assert!(response.body.error_code.is_none());
}
