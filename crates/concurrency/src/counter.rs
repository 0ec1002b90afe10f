//! Atomic Counter Service
//!
//! A bounded counter per partition key, mutated only through the store's
//! conditional update:
//!
//! ```text
//! SET counter = counter + 1
//! IF attribute_exists(pk) AND counter < max
//! ```
//!
//! A failed guard (record missing or at the ceiling) triggers an
//! unconditional reset and the caller sees `1`. Concurrent callers that all
//! hit the ceiling each reset and each see `1`; duplicate low values under
//! contention are tolerated, resets are not serialized.

use serde_json::Value;
use std::sync::Arc;
use tideline_core::{
    require_non_empty, Condition, CounterConfig, CounterResetMode, Key, ReturnValues, Store,
    TidelineConfig, TidelineResult, UpdateExpr, UpdateOutcome, UpdateRequest,
};

/// Atomic counter over one table
#[derive(Clone)]
pub struct AtomicCounter {
    store: Arc<dyn Store>,
    table: String,
    key_attribute: String,
    config: CounterConfig,
}

impl AtomicCounter {
    /// Create a counter over `table`, keyed by `key_attribute`
    pub fn new(
        store: Arc<dyn Store>,
        table: impl Into<String>,
        key_attribute: impl Into<String>,
        config: CounterConfig,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            key_attribute: key_attribute.into(),
            config,
        }
    }

    /// Counter over the configured error catalog table
    pub fn from_config(store: Arc<dyn Store>, config: &TidelineConfig) -> Self {
        Self::new(
            store,
            config.tables.error_catalog.clone(),
            config.tables.error_catalog_key.clone(),
            config.counter.clone(),
        )
    }

    /// Table holding the counter records
    pub fn table(&self) -> &str {
        &self.table
    }

    fn key(&self, partition_key: &str) -> Key {
        let mut key = Key::new();
        key.insert(
            self.key_attribute.clone(),
            Value::String(partition_key.to_string()),
        );
        key
    }

    /// Increment the counter and return its new value
    ///
    /// Returns `1` when the guard fails (after resetting) or when the store
    /// returns no attributes.
    pub async fn increment(&self, partition_key: &str) -> TidelineResult<u32> {
        require_non_empty("partition key", partition_key)?;
        let attr = self.config.attribute.as_str();

        let request = UpdateRequest {
            table: self.table.clone(),
            key: self.key(partition_key),
            update: UpdateExpr::new().increment(attr, 1),
            condition: Some(
                Condition::exists(self.key_attribute.as_str())
                    .and(Condition::lt(attr, i64::from(self.config.max))),
            ),
            return_values: ReturnValues::AllNew,
        };

        match self.store.conditional_update(request).await? {
            UpdateOutcome::Applied { attributes } => Ok(attributes
                .as_ref()
                .and_then(|a| a.get(attr))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(1)),
            UpdateOutcome::ConditionFailed => {
                tracing::debug!(
                    target: "tideline::counter",
                    table = %self.table,
                    partition_key,
                    "counter guard failed, resetting"
                );
                self.reset(partition_key).await?;
                Ok(1)
            }
        }
    }

    async fn reset(&self, partition_key: &str) -> TidelineResult<()> {
        let attr = self.config.attribute.as_str();
        let update = match self.config.reset_mode {
            CounterResetMode::Increment => UpdateExpr::new().add(attr, 1),
            CounterResetMode::Rearm => UpdateExpr::new().set(attr, 1),
        };
        self.store
            .conditional_update(UpdateRequest {
                table: self.table.clone(),
                key: self.key(partition_key),
                update,
                condition: None,
                return_values: ReturnValues::None,
            })
            .await?;
        tracing::info!(
            target: "tideline::counter",
            table = %self.table,
            partition_key,
            mode = ?self.config.reset_mode,
            "counter reset"
        );
        Ok(())
    }
}

impl std::fmt::Debug for AtomicCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicCounter")
            .field("table", &self.table)
            .field("key_attribute", &self.key_attribute)
            .field("config", &self.config)
            .finish()
    }
}
