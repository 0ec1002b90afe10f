//! Data Access Comprehensive Test Suite
//!
//! Drives the `Tideline` facade against the in-memory store.
//!
//! ## Tiers
//!
//! - **Tier 1**: Retrieval (queries, pages, scans, message log)
//! - **Tier 2**: Bounded batch fetch (windowing, backoff, retry ceiling)
//! - **Tier 3**: Conditional updates (counter, reply claims)
//! - **Tier 4**: Error codes and error responses
//! - **Tier 5**: Deadlines and configuration
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test data_access_comprehensive
//! ```

mod test_utils;

mod tier1_retrieval;
mod tier2_batch_fetch;
mod tier3_conditional_updates;
mod tier4_error_codes;
mod tier5_deadlines_and_config;
