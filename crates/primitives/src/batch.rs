//! Bounded Batch Fetcher
//!
//! Reads many keys through `batch_get`, carrying unprocessed keys into the
//! next round with exponential backoff and a hard retry ceiling.
//!
//! # Windowing
//!
//! Each round holds at most `page_size` keys. Carried-over unprocessed keys
//! go first; the remaining space admits new keys from the input:
//!
//! ```text
//! space_left = page_size - unprocessed.len()
//! ```
//!
//! # Retry ceiling
//!
//! The retry counter is per call and never resets. Every round that leaves
//! keys unprocessed increments it; once it exceeds `max_retries` the call
//! fails with `RetryCeilingExceeded`, which means the table lacks capacity
//! for the workload. Other store errors fail the call immediately.

use std::sync::Arc;
use std::time::Duration;
use tideline_core::config::MAX_BATCH_PAGE_SIZE;
use tideline_core::{
    require_non_empty, BatchConfig, BatchGetRequest, Key, KeySchema, Store, TableRef,
    TidelineError, TidelineResult,
};

/// Backoff before retry round `retry`: `base_ms * 2^retry`
pub fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Projection plus any key attributes it lacks; empty stays empty (all attributes)
fn widen_projection(projection: &[String], schema: &KeySchema) -> Vec<String> {
    if projection.is_empty() {
        return Vec::new();
    }
    let mut widened = projection.to_vec();
    for attr in schema.attributes() {
        if !widened.iter().any(|p| p == attr) {
            widened.push(attr.to_string());
        }
    }
    widened
}

/// Bounded batch fetcher
#[derive(Clone)]
pub struct BatchFetcher {
    store: Arc<dyn Store>,
    config: BatchConfig,
}

impl BatchFetcher {
    /// Create a fetcher with explicit settings
    pub fn new(store: Arc<dyn Store>, config: BatchConfig) -> Self {
        Self { store, config }
    }

    /// Settings in use
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Fetch every key and return one composite identifier per item found
    ///
    /// Missing keys are absent from the result. Item payloads are not
    /// returned; callers re-fetch by identifier.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty table name
    /// - `RetryCeilingExceeded` once unprocessed rounds exceed `max_retries`
    /// - `Store` for any other store fault, without retry
    pub async fn batch_get_all(
        &self,
        table: &TableRef,
        projection: &[String],
        keys: &[Key],
    ) -> TidelineResult<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        require_non_empty("table", &table.name)?;

        let page_size = self.config.page_size.clamp(1, MAX_BATCH_PAGE_SIZE) as usize;
        let projection = widen_projection(projection, &table.key_schema);
        let delimiter = self.config.id_delimiter.as_str();

        let mut ids = Vec::with_capacity(keys.len());
        let mut next = 0usize;
        let mut unprocessed: Vec<Key> = Vec::new();
        let mut retries = 0u32;
        let mut rounds = 0u32;

        while next < keys.len() || !unprocessed.is_empty() {
            let space_left = page_size.saturating_sub(unprocessed.len());
            let end = (next + space_left).min(keys.len());
            let mut round_keys = std::mem::take(&mut unprocessed);
            round_keys.extend_from_slice(&keys[next..end]);
            next = end;

            let output = self
                .store
                .batch_get(BatchGetRequest {
                    table: table.name.clone(),
                    keys: round_keys,
                    projection: projection.clone(),
                })
                .await?;
            rounds += 1;

            for item in &output.items {
                let id = table.key_schema.composite_id(item, delimiter).ok_or_else(|| {
                    TidelineError::invalid_data(format!(
                        "item from {} is missing key attributes",
                        table.name
                    ))
                })?;
                ids.push(id);
            }

            unprocessed = output.unprocessed_keys;
            if unprocessed.is_empty() {
                continue;
            }

            retries += 1;
            if retries > self.config.max_retries {
                tracing::error!(
                    target: "tideline::batch",
                    table = %table.name,
                    retries,
                    unprocessed = unprocessed.len(),
                    "retry ceiling exceeded"
                );
                return Err(TidelineError::RetryCeilingExceeded {
                    table: table.name.clone(),
                    retries,
                    unprocessed: unprocessed.len(),
                });
            }
            let delay = backoff_delay(self.config.backoff_base_ms, retries);
            tracing::warn!(
                target: "tideline::batch",
                table = %table.name,
                retry = retries,
                unprocessed = unprocessed.len(),
                delay_ms = delay.as_millis() as u64,
                "unprocessed keys, backing off"
            );
            tokio::time::sleep(delay).await;
        }

        tracing::debug!(
            target: "tideline::batch",
            table = %table.name,
            rounds,
            retries,
            found = ids.len(),
            requested = keys.len(),
            "batch complete"
        );
        Ok(ids)
    }
}
