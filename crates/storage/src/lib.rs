//! Store adapters for Tideline
//!
//! - [`ShardedStore`]: in-process store with partitioned-store semantics,
//!   used for tests, benches and embedded use
//! - `DynamoStore` (feature `dynamodb`): Amazon DynamoDB

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sharded;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

pub use sharded::{Shard, ShardedStore, ShardedStoreOptions, StoreStats, MAX_BATCH_KEYS};

/// The in-memory store under the name the rest of the workspace uses
pub type MemoryStore = ShardedStore;

#[cfg(feature = "dynamodb")]
pub use dynamodb::{DynamoStore, DynamoStoreConfig};
