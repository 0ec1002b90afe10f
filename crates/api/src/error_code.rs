//! Error Code Generator
//!
//! Mints `<abbreviation>-<suffix>` codes such as `TL-0500` or `EM-1007`.
//!
//! | Status | Suffix |
//! |--------|--------|
//! | `>= 500` | `0<status>` |
//! | `401..=499` | `0<status>` |
//! | anything else | counter-derived, 4 digits |
//!
//! Counter-derived suffixes come from the atomic counter keyed by
//! `<request id>-<service name>`: `100n` for 1-9, `10nn` for 10-99,
//! `1nnn` for 100-999.

use crate::services::ServiceRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tideline_concurrency::AtomicCounter;
use tideline_core::{require_non_empty, TidelineResult};

/// Source of per-key sequence numbers for counter-derived suffixes
#[async_trait]
pub trait SequenceSource: Send + Sync {
    /// Next value for `key`
    async fn next_value(&self, key: &str) -> TidelineResult<u32>;
}

#[async_trait]
impl SequenceSource for AtomicCounter {
    async fn next_value(&self, key: &str) -> TidelineResult<u32> {
        self.increment(key).await
    }
}

/// Whether a status takes a counter-derived suffix
pub fn uses_counter(status: u16) -> bool {
    !(status >= 500 || (status > 400 && status < 500))
}

/// Numeric suffix for a status and counter value
pub fn error_suffix(status: u16, counter: u32) -> String {
    if !uses_counter(status) {
        return format!("0{}", status);
    }
    match counter {
        1..=9 => format!("100{}", counter),
        10..=99 => format!("10{}", counter),
        100..=999 => format!("1{}", counter),
        _ => format!("100{}", counter),
    }
}

/// Error code generator
#[derive(Clone)]
pub struct ErrorCodeGenerator {
    registry: Arc<ServiceRegistry>,
    sequence: Arc<dyn SequenceSource>,
}

impl ErrorCodeGenerator {
    /// Create a generator
    pub fn new(registry: Arc<ServiceRegistry>, sequence: Arc<dyn SequenceSource>) -> Self {
        Self { registry, sequence }
    }

    /// Service registry in use
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Build the error code for one failure occurrence
    ///
    /// The counter is only consulted for statuses that need it, so 5xx and
    /// 401-499 codes never touch the store.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty request id on the counter path; counter
    /// failures propagate so the response formatter can degrade.
    pub async fn build_error_code(
        &self,
        service_name: &str,
        status_code: u16,
        request_id: &str,
    ) -> TidelineResult<String> {
        let counter = if uses_counter(status_code) {
            require_non_empty("request id", request_id)?;
            self.sequence
                .next_value(&format!("{}-{}", request_id, service_name))
                .await?
        } else {
            1
        };
        let code = format!(
            "{}-{}",
            self.registry.prefix(service_name),
            error_suffix(status_code, counter)
        );
        tracing::debug!(
            target: "tideline::error_code",
            service = service_name,
            status = status_code,
            code = %code,
            "error code built"
        );
        Ok(code)
    }
}

impl std::fmt::Debug for ErrorCodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorCodeGenerator")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
