//! Configuration
//!
//! Loaded once at startup, typically from a `tideline.toml` file, and treated
//! as immutable afterwards. Every section has defaults so a partial file (or
//! no file) is valid.
//!
//! ```toml
//! operation_timeout_ms = 5000   # 0 disables deadlines
//!
//! [batch]
//! page_size = 50
//!
//! [services]
//! "Billing" = "BL"
//! ```

use crate::error::{TidelineError, TidelineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Largest batch a single `batch_get` round may carry
pub const MAX_BATCH_PAGE_SIZE: u32 = 100;

/// Largest counter value the four-digit error code suffix can represent
pub const MAX_COUNTER_CEILING: u32 = 999;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidelineConfig {
    /// Table names and key attributes
    pub tables: TableConfig,
    /// Bounded batch fetcher settings
    pub batch: BatchConfig,
    /// Atomic counter settings
    pub counter: CounterConfig,
    /// Extra or overriding service abbreviations (service name to code)
    pub services: BTreeMap<String, String>,
    /// Deadline applied to each facade operation
    ///
    /// `0` (or `None` when built in code) disables it.
    pub operation_timeout_ms: Option<u64>,
}

impl Default for TidelineConfig {
    fn default() -> Self {
        Self {
            tables: TableConfig::default(),
            batch: BatchConfig::default(),
            counter: CounterConfig::default(),
            services: BTreeMap::new(),
            operation_timeout_ms: Some(10_000),
        }
    }
}

/// Table names and their key attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Counter records used for error codes
    pub error_catalog: String,
    /// Partition key attribute of `error_catalog`
    pub error_catalog_key: String,
    /// Reply reference records
    pub references: String,
    /// Partition key attribute of `references`
    pub references_key: String,
    /// Joins message and reply ids into a reference id
    ///
    /// Part of every stored reference key; changing it orphans armed records.
    pub references_delimiter: String,
    /// Message log
    pub messages: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            error_catalog: "error_service_catalog".to_string(),
            error_catalog_key: "partition_error_service_key".to_string(),
            references: "message_references".to_string(),
            references_key: "reference_id".to_string(),
            references_delimiter: "#".to_string(),
            messages: "messages".to_string(),
        }
    }
}

/// Bounded batch fetcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum keys in flight per round
    pub page_size: u32,
    /// Retry rounds tolerated before failing with a capacity error
    pub max_retries: u32,
    /// Backoff base; delay is `base * 2^retry`
    pub backoff_base_ms: u64,
    /// Joins key values into composite identifiers
    pub id_delimiter: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_BATCH_PAGE_SIZE,
            max_retries: 3,
            backoff_base_ms: 100,
            id_delimiter: "#".to_string(),
        }
    }
}

/// How the counter recovers once its ceiling is hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterResetMode {
    /// Unconditional increment by one; the stored value keeps drifting upward
    #[default]
    Increment,
    /// Unconditional `SET counter = 1`
    Rearm,
}

/// Atomic counter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Exclusive guard: increments apply only while `counter < max`
    pub max: u32,
    /// Counter attribute name
    pub attribute: String,
    /// Recovery behaviour after a failed guard
    pub reset_mode: CounterResetMode,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            max: MAX_COUNTER_CEILING,
            attribute: "counter".to_string(),
            reset_mode: CounterResetMode::Increment,
        }
    }
}

impl TidelineConfig {
    /// Parse from a TOML string and validate
    pub fn from_toml_str(s: &str) -> TidelineResult<Self> {
        let config: TidelineConfig =
            toml::from_str(s).map_err(|e| TidelineError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> TidelineResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TidelineError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check value ranges and required names
    pub fn validate(&self) -> TidelineResult<()> {
        if self.batch.page_size == 0 || self.batch.page_size > MAX_BATCH_PAGE_SIZE {
            return Err(TidelineError::config(format!(
                "batch.page_size must be between 1 and {}, got {}",
                MAX_BATCH_PAGE_SIZE, self.batch.page_size
            )));
        }
        if self.counter.max == 0 || self.counter.max > MAX_COUNTER_CEILING {
            return Err(TidelineError::config(format!(
                "counter.max must be between 1 and {}, got {}",
                MAX_COUNTER_CEILING, self.counter.max
            )));
        }
        if self.batch.id_delimiter.is_empty() {
            return Err(TidelineError::config("batch.id_delimiter must not be empty"));
        }
        let names = [
            ("tables.error_catalog", &self.tables.error_catalog),
            ("tables.error_catalog_key", &self.tables.error_catalog_key),
            ("tables.references", &self.tables.references),
            ("tables.references_key", &self.tables.references_key),
            ("tables.references_delimiter", &self.tables.references_delimiter),
            ("tables.messages", &self.tables.messages),
            ("counter.attribute", &self.counter.attribute),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(TidelineError::config(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }

    /// Effective per-operation deadline; None when disabled
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
