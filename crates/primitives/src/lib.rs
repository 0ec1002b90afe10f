//! Retrieval primitives for Tideline
//!
//! This crate implements the read side of the data-access layer:
//! - Paginated Query Engine: single-page and drain-to-completion queries
//! - Full Table Scanner: always-recursive scans
//! - Bounded Batch Fetcher: multi-key reads with bounded retry of unprocessed keys
//! - Message log: time-range reads with payload decoding
//!
//! All primitives are stateless facades over a shared `Arc<dyn Store>`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod messages;
pub mod query;
pub mod scan;

pub use batch::{backoff_delay, BatchFetcher};
pub use messages::MessageLog;
pub use query::{QueryDescriptor, QueryEngine, QueryPages};
pub use scan::{ScanPages, TableScanner};
