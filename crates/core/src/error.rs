//! Error types
//!
//! Two layers:
//!
//! - [`StoreError`]: faults reported by a store adapter. A failed condition is
//!   not among them; it is the `UpdateOutcome::ConditionFailed` variant.
//! - [`TidelineError`]: the caller-facing taxonomy
//!
//! | Kind | Variant | Retried here |
//! |------|---------|--------------|
//! | Caller error | `InvalidInput` | never |
//! | Store fatal error | `Store` | never |
//! | Capacity under-provisioning | `RetryCeilingExceeded` | bounded, then fatal |
//! | Deadline miss | `Timeout` | never |

use thiserror::Error;

/// Faults reported by a store adapter
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Table does not exist
    #[error("table not found: {table}")]
    TableNotFound {
        /// Table name
        table: String,
    },

    /// Request rejected by the store as malformed
    #[error("validation error on {table}: {message}")]
    Validation {
        /// Table name
        table: String,
        /// Store-provided description
        message: String,
    },

    /// Provisioned throughput exceeded for a whole request
    #[error("throughput exceeded on {table}")]
    Throttled {
        /// Table name
        table: String,
    },

    /// Any other backend failure (network, auth, internal)
    #[error("store backend error: {message}")]
    Backend {
        /// Description
        message: String,
    },
}

impl StoreError {
    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(table: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Validation {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Result type for store adapter operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Caller-facing error taxonomy
#[derive(Debug, Error)]
pub enum TidelineError {
    /// Missing or invalid caller input, raised before any store call
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong
        reason: String,
    },

    /// Store error propagated unchanged
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unprocessed keys kept coming back past the retry ceiling
    ///
    /// Signals that the table is under-provisioned for the requested
    /// throughput, as opposed to a transient fault.
    #[error(
        "retry ceiling exceeded on table {table}: {unprocessed} keys still unprocessed after {retries} retries"
    )]
    RetryCeilingExceeded {
        /// Table being read
        table: String,
        /// Retry rounds performed
        retries: u32,
        /// Keys still outstanding
        unprocessed: usize,
    },

    /// Operation exceeded its deadline
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation name
        operation: String,
        /// Configured deadline
        timeout_ms: u64,
    },

    /// Stored data could not be decoded
    #[error("invalid stored data: {reason}")]
    InvalidData {
        /// What was wrong
        reason: String,
    },

    /// Invalid configuration
    #[error("invalid configuration: {reason}")]
    Config {
        /// What was wrong
        reason: String,
    },
}

impl TidelineError {
    /// Create an invalid input error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        TidelineError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(reason: impl Into<String>) -> Self {
        TidelineError::InvalidData {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        TidelineError::Config {
            reason: reason.into(),
        }
    }

    /// Errors that indicate the store lacks capacity for the workload
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            TidelineError::RetryCeilingExceeded { .. }
                | TidelineError::Store(StoreError::Throttled { .. })
        )
    }

    /// Errors a caller may reasonably retry later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TidelineError::Timeout { .. } | TidelineError::Store(StoreError::Throttled { .. })
        )
    }

    /// Caller errors
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, TidelineError::InvalidInput { .. })
    }
}

/// Result type for caller-facing operations
pub type TidelineResult<T> = std::result::Result<T, TidelineError>;

/// Reject an empty required string parameter
pub fn require_non_empty(name: &str, value: &str) -> TidelineResult<()> {
    if value.trim().is_empty() {
        return Err(TidelineError::invalid_input(format!("{} is required", name)));
    }
    Ok(())
}
