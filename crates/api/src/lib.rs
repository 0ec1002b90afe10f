//! Failure reporting for Tideline
//!
//! - [`ServiceRegistry`]: service name to abbreviation, plus unknown names seen
//! - [`ErrorCodeGenerator`]: `<abbreviation>-<suffix>` error codes
//! - [`ErrorResponder`]: JSON error bodies with a non-failing degrade path

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error_code;
pub mod response;
pub mod services;

pub use error_code::{error_suffix, uses_counter, ErrorCodeGenerator, SequenceSource};
pub use response::{
    error_data, ApiInfo, ErrorBody, ErrorDetail, ErrorResponder, ErrorResponse, RequestContext,
    FALLBACK_MESSAGE,
};
pub use services::{ServiceRegistry, DEFAULT_SERVICE, UNKNOWN_SERVICE_PREFIX};
