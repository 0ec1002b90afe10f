//! Store adapter boundary
//!
//! The four primitives every backing store must provide. Everything above this
//! trait (pagination, retry, idempotency) is store-agnostic.

use crate::error::StoreResult;
use crate::expr::{Condition, KeyCondition, ReturnValues, UpdateExpr};
use crate::types::{Cursor, Item, Key, Page};
use async_trait::async_trait;

/// One page of a key-condition query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Table name
    pub table: String,
    /// Partition equality plus optional sort predicate
    pub key_condition: KeyCondition,
    /// Page size hint
    pub limit: Option<u32>,
    /// Continuation from the previous page of the same query
    pub exclusive_start: Option<Cursor>,
}

/// One page of a full-table scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Table name
    pub table: String,
    /// Page size hint
    pub limit: Option<u32>,
    /// Continuation from the previous page of the same scan
    pub exclusive_start: Option<Cursor>,
}

/// A single multi-key read against one table
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetRequest {
    /// Table name
    pub table: String,
    /// Keys to read
    pub keys: Vec<Key>,
    /// Attributes to return; empty means all
    pub projection: Vec<String>,
}

/// Result of one batch read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutput {
    /// Items found (missing keys are simply absent)
    pub items: Vec<Item>,
    /// Keys the store did not service in this round
    pub unprocessed_keys: Vec<Key>,
}

/// A conditional single-item update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    /// Table name
    pub table: String,
    /// Primary key of the item
    pub key: Key,
    /// Actions to apply
    pub update: UpdateExpr,
    /// Guard evaluated against the existing item
    pub condition: Option<Condition>,
    /// Attributes to return on success
    pub return_values: ReturnValues,
}

/// Outcome of a conditional update
///
/// A failed condition is an expected outcome, not a fault, so it is a variant
/// here rather than a [`StoreError`](crate::StoreError).
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Condition held and the update was applied
    Applied {
        /// Attributes selected by `ReturnValues`
        attributes: Option<Item>,
    },
    /// Condition did not hold; nothing was written
    ConditionFailed,
}

impl UpdateOutcome {
    /// Check if the update was applied
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied { .. })
    }
}

/// Capability boundary over a partitioned key-value/document store
///
/// Implementations must apply `conditional_update` atomically: the condition
/// and the write form one compare-and-swap against concurrent callers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read one page of items matching a key condition, in sort-key order
    async fn query(&self, request: QueryRequest) -> StoreResult<Page>;

    /// Read one page of a full-table scan
    async fn scan(&self, request: ScanRequest) -> StoreResult<Page>;

    /// Read many keys in one round; some may come back unprocessed
    async fn batch_get(&self, request: BatchGetRequest) -> StoreResult<BatchGetOutput>;

    /// Apply an update if its condition holds
    async fn conditional_update(&self, request: UpdateRequest) -> StoreResult<UpdateOutcome>;
}
