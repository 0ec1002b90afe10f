//! Public types for the Tideline API.
//!
//! This module re-exports types from the member crates with a clean public interface.

// ============================================================================
// Data model
// ============================================================================

pub use tideline_core::{item, Cursor, Item, Key, KeySchema, KeyToken, Page, TableRef};

// Typed predicates and updates
pub use tideline_core::{
    CompareOp, Condition, KeyCondition, ReturnValues, SortCondition, UpdateAction, UpdateExpr,
};

// ============================================================================
// Store boundary
// ============================================================================

pub use tideline_core::{
    BatchGetOutput, BatchGetRequest, QueryRequest, ScanRequest, Store, UpdateOutcome,
    UpdateRequest,
};
pub use tideline_storage::{MemoryStore, ShardedStoreOptions, StoreStats};

#[cfg(feature = "dynamodb")]
pub use tideline_storage::{DynamoStore, DynamoStoreConfig};

// ============================================================================
// Errors and configuration
// ============================================================================

pub use tideline_core::{
    BatchConfig, CounterConfig, CounterResetMode, StoreError, StoreResult, TableConfig,
    TidelineConfig, TidelineError, TidelineResult,
};

// ============================================================================
// Components
// ============================================================================

pub use tideline_api::{
    error_data, error_suffix, ErrorBody, ErrorCodeGenerator, ErrorResponder, ErrorResponse,
    RequestContext, SequenceSource, ServiceRegistry,
};
pub use tideline_concurrency::{AtomicCounter, Message, ReferenceCounter, Reply};
pub use tideline_primitives::{
    backoff_delay, BatchFetcher, MessageLog, QueryDescriptor, QueryEngine, QueryPages,
    ScanPages, TableScanner,
};
