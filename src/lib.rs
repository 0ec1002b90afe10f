//! Tideline: a resilient data-access layer over partitioned key-value stores
//!
//! Tideline adds pagination, bounded retry and idempotency on top of four
//! store primitives (`query`, `scan`, `batch_get`, `conditional_update`).
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tideline::{KeyCondition, MemoryStore, QueryDescriptor, Tideline, TidelineConfig};
//!
//! let store = Arc::new(MemoryStore::new());
//! let db = Tideline::new(store, TidelineConfig::default())?;
//!
//! let descriptor = QueryDescriptor::new("devices", KeyCondition::partition("device", "d1"))
//!     .recursive(true);
//! let items = db.query(&descriptor).await?.unwrap_or_default();
//! ```
//!
//! # Deadlines
//!
//! Every async operation on [`Tideline`] runs under `operation_timeout_ms`
//! (10s by default, `0` disables it). A miss yields `TidelineError::Timeout`;
//! the store call in flight is dropped.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod types;

pub use types::*;

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Run a future under an optional deadline
async fn within<T, F>(operation: &str, timeout: Option<Duration>, fut: F) -> TidelineResult<T>
where
    F: Future<Output = TidelineResult<T>>,
{
    let Some(limit) = timeout else {
        return fut.await;
    };
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            let timeout_ms = limit.as_millis() as u64;
            tracing::warn!(target: "tideline", operation, timeout_ms, "deadline exceeded");
            Err(TidelineError::Timeout {
                operation: operation.to_string(),
                timeout_ms,
            })
        }
    }
}

/// Counter increments under the facade deadline, so error responses never hang
struct BoundedCounter {
    counter: AtomicCounter,
    timeout: Option<Duration>,
}

#[async_trait]
impl SequenceSource for BoundedCounter {
    async fn next_value(&self, key: &str) -> TidelineResult<u32> {
        within("increment_counter", self.timeout, self.counter.increment(key)).await
    }
}

/// Store plus configuration, with every component wired up
#[derive(Clone)]
pub struct Tideline {
    store: Arc<dyn Store>,
    config: Arc<TidelineConfig>,
    timeout: Option<Duration>,
    queries: QueryEngine,
    scanner: TableScanner,
    batches: BatchFetcher,
    counter: AtomicCounter,
    references: ReferenceCounter,
    messages: MessageLog,
    generator: ErrorCodeGenerator,
    responder: ErrorResponder,
}

impl Tideline {
    /// Validate `config` and wire every component over `store`
    pub fn new(store: Arc<dyn Store>, config: TidelineConfig) -> TidelineResult<Self> {
        config.validate()?;
        let timeout = config.operation_timeout();

        let counter = AtomicCounter::from_config(Arc::clone(&store), &config);
        let generator = ErrorCodeGenerator::new(
            Arc::new(ServiceRegistry::from_config(&config)),
            Arc::new(BoundedCounter {
                counter: counter.clone(),
                timeout,
            }),
        );

        Ok(Self {
            queries: QueryEngine::new(Arc::clone(&store)),
            scanner: TableScanner::new(Arc::clone(&store)),
            batches: BatchFetcher::new(Arc::clone(&store), config.batch.clone()),
            references: ReferenceCounter::from_config(Arc::clone(&store), &config),
            messages: MessageLog::new(Arc::clone(&store), config.tables.messages.clone()),
            responder: ErrorResponder::new(generator.clone()),
            generator,
            counter,
            timeout,
            config: Arc::new(config),
            store,
        })
    }

    /// Load configuration from a TOML file, then [`Tideline::new`]
    pub fn from_config_file(
        store: Arc<dyn Store>,
        path: impl AsRef<std::path::Path>,
    ) -> TidelineResult<Self> {
        Self::new(store, TidelineConfig::from_file(path)?)
    }

    /// Configuration in use
    pub fn config(&self) -> &TidelineConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Service abbreviation registry
    pub fn services(&self) -> &ServiceRegistry {
        self.generator.registry()
    }

    // ========================================================================
    // Retrieval
    // ========================================================================

    /// Run a paginated query (see [`QueryEngine::query`])
    pub async fn query(&self, descriptor: &QueryDescriptor) -> TidelineResult<Option<Vec<Item>>> {
        within("query", self.timeout, self.queries.query(descriptor)).await
    }

    /// Page-by-page view of a query
    ///
    /// The deadline is not applied here; each `next_page` call is the
    /// caller's to bound.
    pub fn pages(&self, descriptor: QueryDescriptor) -> TidelineResult<QueryPages> {
        self.queries.pages(descriptor)
    }

    /// Read every item of a table
    pub async fn scan_all(&self, table: &str) -> TidelineResult<Vec<Item>> {
        within("scan_all", self.timeout, self.scanner.scan_all(table)).await
    }

    /// Fetch many keys, returning composite identifiers of the items found
    ///
    /// The deadline covers the whole call, backoff sleeps included.
    pub async fn batch_get_all(
        &self,
        table: &TableRef,
        projection: &[String],
        keys: &[Key],
    ) -> TidelineResult<Vec<String>> {
        within(
            "batch_get_all",
            self.timeout,
            self.batches.batch_get_all(table, projection, keys),
        )
        .await
    }

    /// Time-range read over the message log
    pub async fn messages_between(
        &self,
        composite_id: &str,
        from: i64,
        to: i64,
        page_size: Option<u32>,
    ) -> TidelineResult<Vec<Item>> {
        within(
            "messages_between",
            self.timeout,
            self.messages.messages_between(composite_id, from, to, page_size),
        )
        .await
    }

    // ========================================================================
    // Counters and error reporting
    // ========================================================================

    /// Increment the error catalog counter for `partition_key`
    pub async fn increment_counter(&self, partition_key: &str) -> TidelineResult<u32> {
        within(
            "increment_counter",
            self.timeout,
            self.counter.increment(partition_key),
        )
        .await
    }

    /// Build an error code for one failure occurrence
    pub async fn build_error_code(
        &self,
        service_name: &str,
        status_code: u16,
        request_id: &str,
    ) -> TidelineResult<String> {
        self.generator
            .build_error_code(service_name, status_code, request_id)
            .await
    }

    /// Build a complete error response; never fails
    pub async fn respond_error(
        &self,
        ctx: &RequestContext,
        message: &str,
        status: u16,
        data: Option<Value>,
    ) -> ErrorResponse {
        self.responder.respond(ctx, message, status, data).await
    }

    // ========================================================================
    // Replies
    // ========================================================================

    /// Claim a reply; returns the embedded message for the first claim only
    pub async fn register_reply(
        &self,
        message: &Message,
        reply: &Reply,
    ) -> TidelineResult<Option<Value>> {
        within(
            "register_reply",
            self.timeout,
            self.references.register_reply(message, reply),
        )
        .await
    }

    /// Create the reference record for an expected reply
    pub async fn arm_reply(
        &self,
        message: &Message,
        reply_id: &str,
        initial_ts: i64,
    ) -> TidelineResult<bool> {
        within(
            "arm_reply",
            self.timeout,
            self.references.arm(message, reply_id, initial_ts),
        )
        .await
    }
}

impl std::fmt::Debug for Tideline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tideline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
