//! Core types for Tideline
//!
//! This crate defines everything shared between the store adapters and the
//! data-access layers above them:
//! - Items, keys, cursors and key schemas
//! - Typed key conditions, update conditions and update actions
//! - The [`Store`] trait (the store adapter boundary)
//! - The error taxonomy and configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod expr;
pub mod store;
pub mod types;

pub use config::{BatchConfig, CounterConfig, CounterResetMode, TableConfig, TidelineConfig};
pub use error::{
    require_non_empty, StoreError, StoreResult, TidelineError, TidelineResult,
};
pub use expr::{
    CompareOp, Condition, ExpressionBuilder, KeyCondition, ReturnValues, SortCondition,
    UpdateAction, UpdateExpr,
};
pub use store::{
    BatchGetOutput, BatchGetRequest, QueryRequest, ScanRequest, Store, UpdateOutcome,
    UpdateRequest,
};
pub use types::{item, Cursor, Item, Key, KeySchema, KeyToken, Page, TableRef};
