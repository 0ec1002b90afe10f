//! Message log reader
//!
//! Time-range reads over a message table keyed by `compositeId` (partition)
//! and `ts` (sort). Each stored item carries its original payload as a JSON
//! string in `actual_payload`, which is decoded in place.

use crate::query::{QueryDescriptor, QueryEngine};
use serde_json::Value;
use std::sync::Arc;
use tideline_core::{require_non_empty, Item, KeyCondition, Store, TidelineError, TidelineResult};

/// Partition key attribute of the message table
pub const COMPOSITE_ID_ATTRIBUTE: &str = "compositeId";
/// Sort key attribute of the message table
pub const TIMESTAMP_ATTRIBUTE: &str = "ts";
/// String attribute holding the JSON-encoded payload
pub const PAYLOAD_ATTRIBUTE: &str = "actual_payload";

/// Reader over one message table
#[derive(Clone)]
pub struct MessageLog {
    engine: QueryEngine,
    table: String,
}

impl MessageLog {
    /// Create a reader for `table`
    pub fn new(store: Arc<dyn Store>, table: impl Into<String>) -> Self {
        Self {
            engine: QueryEngine::new(store),
            table: table.into(),
        }
    }

    /// Table being read
    pub fn table(&self) -> &str {
        &self.table
    }

    /// All messages of `composite_id` with `from <= ts <= to`, oldest first
    ///
    /// Drains every page. `page_size` is passed to the store as a hint.
    pub async fn messages_between(
        &self,
        composite_id: &str,
        from: i64,
        to: i64,
        page_size: Option<u32>,
    ) -> TidelineResult<Vec<Item>> {
        require_non_empty("composite id", composite_id)?;
        if from > to {
            return Err(TidelineError::invalid_input(format!(
                "time range start {} is after end {}",
                from, to
            )));
        }

        let mut descriptor = QueryDescriptor::new(
            self.table.clone(),
            KeyCondition::partition(COMPOSITE_ID_ATTRIBUTE, composite_id)
                .between(TIMESTAMP_ATTRIBUTE, from, to),
        )
        .recursive(true);
        descriptor.page_size = page_size;

        let items = self.engine.query(&descriptor).await?.unwrap_or_default();
        items.into_iter().map(decode_payload).collect()
    }
}

fn decode_payload(mut item: Item) -> TidelineResult<Item> {
    let parsed: Value = match item.get(PAYLOAD_ATTRIBUTE) {
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
            TidelineError::invalid_data(format!("{} is not valid JSON: {}", PAYLOAD_ATTRIBUTE, e))
        })?,
        _ => return Ok(item),
    };
    item.insert(PAYLOAD_ATTRIBUTE.to_string(), parsed);
    Ok(item)
}
