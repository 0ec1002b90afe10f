//! Shared fixtures

use serde_json::json;
use std::sync::Arc;
use tideline::{item, KeySchema, MemoryStore, ShardedStoreOptions, Tideline, TidelineConfig};

pub const DEVICES: &str = "devices";

/// Store with every configured table created
pub fn store_with(options: ShardedStoreOptions) -> Arc<MemoryStore> {
    let store = MemoryStore::with_options(options);
    let tables = TidelineConfig::default().tables;
    store.create_table(DEVICES, KeySchema::composite("device", "ts"));
    store.create_table(tables.error_catalog, KeySchema::partition(tables.error_catalog_key));
    store.create_table(tables.references, KeySchema::partition(tables.references_key));
    store.create_table(tables.messages, KeySchema::composite("compositeId", "ts"));
    Arc::new(store)
}

/// Facade with default config over `store`
pub fn facade(store: &Arc<MemoryStore>) -> Tideline {
    Tideline::new(store.clone(), TidelineConfig::default()).unwrap()
}

/// Put `count` readings for `device` with ts 0..count
pub fn seed_readings(store: &MemoryStore, device: &str, count: i64) {
    for ts in 0..count {
        store
            .put_item(
                DEVICES,
                item([
                    ("device", json!(device)),
                    ("ts", json!(ts)),
                    ("reading", json!(ts * 3)),
                ]),
            )
            .unwrap();
    }
}

/// Key of one reading
pub fn reading_key(device: &str, ts: i64) -> tideline::Key {
    item([("device", json!(device)), ("ts", json!(ts))])
}

/// Seed an error catalog counter record
pub fn seed_counter(store: &MemoryStore, key: &str, value: i64) {
    let tables = TidelineConfig::default().tables;
    store
        .put_item(
            &tables.error_catalog,
            item([
                (tables.error_catalog_key.as_str(), json!(key)),
                ("counter", json!(value)),
            ]),
        )
        .unwrap();
}
