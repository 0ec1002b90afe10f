//! Sharded in-memory store
//!
//! An in-process implementation of the [`Store`] boundary with the semantics
//! of a partitioned document store: tables with a key schema, partitions
//! ordered by sort key, page limits with continuation cursors, batch reads
//! that may leave keys unprocessed, and atomic conditional updates.
//!
//! # Design
//!
//! - DashMap: one entry per table, so different tables never contend
//! - FxHashMap: partition token to partition, O(1) lookups
//! - BTreeMap: items inside a partition ordered by sort key
//!
//! # Conditional updates
//!
//! `conditional_update` holds the table's write guard while it evaluates the
//! condition and applies the actions. Concurrent updates to the same table
//! serialize, which gives compare-and-swap semantics per item.
//!
//! # Capacity simulation
//!
//! `batch_capacity` caps how many keys one `batch_get` serves; the rest come
//! back unprocessed. `throttle_next_batches(n)` makes the next `n` calls serve
//! nothing at all.

use async_trait::async_trait;
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tideline_core::{
    BatchGetOutput, BatchGetRequest, Cursor, Item, Key, KeySchema, KeyToken, Page, QueryRequest,
    ReturnValues, ScanRequest, Store, StoreError, StoreResult, UpdateOutcome, UpdateRequest,
};

/// Maximum keys accepted by a single `batch_get`
pub const MAX_BATCH_KEYS: usize = 100;

/// Sort position inside a partition; None for tables without a sort key
type SortSlot = Option<KeyToken>;

/// One table: its key schema and partitions
#[derive(Debug)]
pub struct Shard {
    schema: KeySchema,
    /// Partition token to items ordered by sort key
    pub(crate) partitions: FxHashMap<KeyToken, BTreeMap<SortSlot, Item>>,
}

impl Shard {
    /// Create an empty table shard
    pub fn new(schema: KeySchema) -> Self {
        Self {
            schema,
            partitions: FxHashMap::default(),
        }
    }

    /// Key schema of this table
    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// Number of items across all partitions
    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    /// Check if the table holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the partition and sort position of a key (or full item)
    fn locate(&self, key: &Item) -> Option<(KeyToken, SortSlot)> {
        let partition = KeyToken::from_value(key.get(&self.schema.partition_key)?)?;
        let slot = match &self.schema.sort_key {
            Some(sort) => Some(KeyToken::from_value(key.get(sort)?)?),
            None => None,
        };
        Some((partition, slot))
    }

    fn get(&self, partition: &KeyToken, slot: &SortSlot) -> Option<&Item> {
        self.partitions.get(partition).and_then(|p| p.get(slot))
    }

    /// All items in deterministic scan order (partition token, then sort key)
    fn ordered(&self) -> Vec<(&KeyToken, &SortSlot, &Item)> {
        let mut entries: Vec<_> = self
            .partitions
            .iter()
            .flat_map(|(p, items)| items.iter().map(move |(s, i)| (p, s, i)))
            .collect();
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }
}

/// Tunables for paging and capacity simulation
#[derive(Debug, Clone, Default)]
pub struct ShardedStoreOptions {
    /// Store-side page cap applied to every query and scan
    pub page_limit: Option<u32>,
    /// Keys served per `batch_get`; the rest come back unprocessed
    pub batch_capacity: Option<usize>,
}

/// Per-operation call counters
#[derive(Debug, Default)]
pub struct StoreStats {
    queries: AtomicU64,
    scans: AtomicU64,
    batch_gets: AtomicU64,
    updates: AtomicU64,
}

impl StoreStats {
    /// `query` calls so far
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// `scan` calls so far
    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// `batch_get` calls so far
    pub fn batch_gets(&self) -> u64 {
        self.batch_gets.load(Ordering::Relaxed)
    }

    /// `conditional_update` calls so far
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Calls across all operations
    pub fn total(&self) -> u64 {
        self.queries() + self.scans() + self.batch_gets() + self.updates()
    }
}

/// Sharded in-memory store - DashMap by table, FxHashMap by partition
///
/// # Example
///
/// ```ignore
/// use tideline_storage::ShardedStore;
/// use tideline_core::KeySchema;
///
/// let store = ShardedStore::new();
/// store.create_table("devices", KeySchema::composite("device", "ts"));
/// store.put_item("devices", item)?;
/// ```
pub struct ShardedStore {
    tables: DashMap<String, Shard>,
    options: ShardedStoreOptions,
    throttled_batches: AtomicU32,
    stats: StoreStats,
}

impl ShardedStore {
    /// Create a store with no page cap and unlimited batch capacity
    pub fn new() -> Self {
        Self::with_options(ShardedStoreOptions::default())
    }

    /// Create a store with explicit options
    pub fn with_options(options: ShardedStoreOptions) -> Self {
        Self {
            tables: DashMap::new(),
            options,
            throttled_batches: AtomicU32::new(0),
            stats: StoreStats::default(),
        }
    }

    /// Create a table; an existing table of the same name is left untouched
    pub fn create_table(&self, name: impl Into<String>, schema: KeySchema) {
        self.tables
            .entry(name.into())
            .or_insert_with(|| Shard::new(schema));
    }

    /// Check if a table exists
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Number of tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Number of items in a table (0 if it does not exist)
    pub fn item_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|s| s.len()).unwrap_or(0)
    }

    /// Insert or replace an item
    pub fn put_item(&self, table: &str, item: Item) -> StoreResult<()> {
        let mut shard = self.tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        let (partition, slot) = shard
            .locate(&item)
            .ok_or_else(|| StoreError::validation(table, "item is missing key attributes"))?;
        shard
            .partitions
            .entry(partition)
            .or_default()
            .insert(slot, item);
        Ok(())
    }

    /// Read a single item by key
    pub fn get_item(&self, table: &str, key: &Key) -> StoreResult<Option<Item>> {
        let shard = self.tables.get(table).ok_or_else(|| table_not_found(table))?;
        let (partition, slot) = shard
            .locate(key)
            .ok_or_else(|| StoreError::validation(table, "key does not match table schema"))?;
        Ok(shard.get(&partition, &slot).cloned())
    }

    /// Serve nothing from the next `rounds` batch reads
    pub fn throttle_next_batches(&self, rounds: u32) {
        self.throttled_batches.store(rounds, Ordering::SeqCst);
    }

    /// Call counters
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    fn page_limit(&self, table: &str, requested: Option<u32>) -> StoreResult<usize> {
        if requested == Some(0) {
            return Err(StoreError::validation(table, "limit must be at least 1"));
        }
        let limit = match (requested, self.options.page_limit) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return Ok(usize::MAX),
        };
        Ok(limit as usize)
    }

    fn take_throttled_round(&self) -> bool {
        self.throttled_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore")
            .field("table_count", &self.table_count())
            .field("options", &self.options)
            .finish()
    }
}

fn table_not_found(table: &str) -> StoreError {
    StoreError::TableNotFound {
        table: table.to_string(),
    }
}

fn project(item: &Item, projection: &[String]) -> Item {
    if projection.is_empty() {
        return item.clone();
    }
    item.iter()
        .filter(|(k, _)| projection.iter().any(|p| p == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[async_trait]
impl Store for ShardedStore {
    async fn query(&self, request: QueryRequest) -> StoreResult<Page> {
        self.stats.queries.fetch_add(1, Ordering::Relaxed);
        let table = request.table.as_str();
        let shard = self.tables.get(table).ok_or_else(|| table_not_found(table))?;
        let cond = &request.key_condition;

        if cond.partition_attr != shard.schema.partition_key {
            return Err(StoreError::validation(
                table,
                format!(
                    "key condition must target partition key '{}'",
                    shard.schema.partition_key
                ),
            ));
        }
        if let Some((attr, _)) = &cond.sort {
            if shard.schema.sort_key.as_ref() != Some(attr) {
                return Err(StoreError::validation(
                    table,
                    format!("'{}' is not the sort key", attr),
                ));
            }
        }
        let partition = cond.partition_token().ok_or_else(|| {
            StoreError::validation(table, "partition value must be a string or integer")
        })?;
        let after = match &request.exclusive_start {
            Some(cursor) => Some(
                shard
                    .locate(cursor.as_key())
                    .ok_or_else(|| StoreError::validation(table, "malformed start key"))?
                    .1,
            ),
            None => None,
        };
        let limit = self.page_limit(table, request.limit)?;

        let Some(items) = shard.partitions.get(&partition) else {
            return Ok(Page::default());
        };
        let mut matching = items
            .iter()
            .filter(|(slot, _)| after.as_ref().map_or(true, |a| *slot > a))
            .filter(|(_, item)| cond.matches(item));
        let page: Vec<Item> = matching
            .by_ref()
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect();
        let cursor = if matching.next().is_some() {
            page.last()
                .and_then(|last| shard.schema.key_of(last))
                .map(Cursor::from_key)
        } else {
            None
        };

        tracing::debug!(
            target: "tideline::store",
            table,
            returned = page.len(),
            more = cursor.is_some(),
            "query page"
        );
        Ok(Page {
            items: page,
            cursor,
        })
    }

    async fn scan(&self, request: ScanRequest) -> StoreResult<Page> {
        self.stats.scans.fetch_add(1, Ordering::Relaxed);
        let table = request.table.as_str();
        let shard = self.tables.get(table).ok_or_else(|| table_not_found(table))?;
        let after = match &request.exclusive_start {
            Some(cursor) => Some(
                shard
                    .locate(cursor.as_key())
                    .ok_or_else(|| StoreError::validation(table, "malformed start key"))?,
            ),
            None => None,
        };
        let limit = self.page_limit(table, request.limit)?;

        let ordered = shard.ordered();
        let mut remaining = ordered
            .into_iter()
            .filter(|(p, s, _)| after.as_ref().map_or(true, |(ap, as_)| (*p, *s) > (ap, as_)));
        let page: Vec<Item> = remaining
            .by_ref()
            .take(limit)
            .map(|(_, _, item)| item.clone())
            .collect();
        let cursor = if remaining.next().is_some() {
            page.last()
                .and_then(|last| shard.schema.key_of(last))
                .map(Cursor::from_key)
        } else {
            None
        };

        tracing::debug!(
            target: "tideline::store",
            table,
            returned = page.len(),
            more = cursor.is_some(),
            "scan page"
        );
        Ok(Page {
            items: page,
            cursor,
        })
    }

    async fn batch_get(&self, request: BatchGetRequest) -> StoreResult<BatchGetOutput> {
        self.stats.batch_gets.fetch_add(1, Ordering::Relaxed);
        let table = request.table.as_str();
        if request.keys.len() > MAX_BATCH_KEYS {
            return Err(StoreError::validation(
                table,
                format!(
                    "too many keys in batch: {} (max {})",
                    request.keys.len(),
                    MAX_BATCH_KEYS
                ),
            ));
        }
        let shard = self.tables.get(table).ok_or_else(|| table_not_found(table))?;

        let capacity = if self.take_throttled_round() {
            0
        } else {
            self.options.batch_capacity.unwrap_or(usize::MAX)
        };
        let served = capacity.min(request.keys.len());
        let mut keys = request.keys;
        let unprocessed_keys = keys.split_off(served);

        let mut items = Vec::with_capacity(keys.len());
        for key in &keys {
            let (partition, slot) = shard
                .locate(key)
                .ok_or_else(|| StoreError::validation(table, "key does not match table schema"))?;
            if let Some(item) = shard.get(&partition, &slot) {
                items.push(project(item, &request.projection));
            }
        }

        Ok(BatchGetOutput {
            items,
            unprocessed_keys,
        })
    }

    async fn conditional_update(&self, request: UpdateRequest) -> StoreResult<UpdateOutcome> {
        self.stats.updates.fetch_add(1, Ordering::Relaxed);
        let table = request.table.as_str();
        let mut shard = self
            .tables
            .get_mut(table)
            .ok_or_else(|| table_not_found(table))?;

        let key_attrs = shard.schema.attributes().len();
        let (partition, slot) = match shard.locate(&request.key) {
            Some(located) if request.key.len() == key_attrs => located,
            _ => {
                return Err(StoreError::validation(
                    table,
                    "key does not match table schema",
                ))
            }
        };
        if let Some(action) = request
            .update
            .actions
            .iter()
            .find(|a| shard.schema.attributes().contains(&a.attr()))
        {
            return Err(StoreError::validation(
                table,
                format!("cannot update key attribute '{}'", action.attr()),
            ));
        }

        let existing = shard.get(&partition, &slot).cloned();
        if let Some(condition) = &request.condition {
            if !condition.evaluate(existing.as_ref()) {
                tracing::debug!(target: "tideline::store", table, "condition failed");
                return Ok(UpdateOutcome::ConditionFailed);
            }
        }

        let mut updated = existing.clone().unwrap_or_else(|| request.key.clone());
        request
            .update
            .apply(&mut updated)
            .map_err(|message| StoreError::validation(table, message))?;
        shard
            .partitions
            .entry(partition)
            .or_default()
            .insert(slot, updated.clone());

        let attributes = match request.return_values {
            ReturnValues::None => None,
            ReturnValues::AllNew => Some(updated),
            ReturnValues::AllOld => existing,
            ReturnValues::UpdatedNew => Some(
                updated
                    .into_iter()
                    .filter(|(k, _)| request.update.actions.iter().any(|a| a.attr() == k))
                    .collect(),
            ),
        };
        Ok(UpdateOutcome::Applied { attributes })
    }
}
