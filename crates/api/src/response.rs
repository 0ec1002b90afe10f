//! Error response formatter
//!
//! Builds the JSON error body returned to API consumers and attaches an
//! error code. Never fails: if the code cannot be generated the response
//! degrades to a fixed 500 body without `error_code`.
//!
//! ```json
//! {
//!   "success": "error",
//!   "api_info": { "uri": "...", "method": "GET /tiles/1", "request_id": "..." },
//!   "error": { "message": "...", "data": null },
//!   "error_code": "TL-0404"
//! }
//! ```

use crate::error_code::ErrorCodeGenerator;
use crate::services::DEFAULT_SERVICE;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used for invalid statuses and the degrade path
pub const FALLBACK_MESSAGE: &str = "Internal Server Error";

const MISSING_PARAMETER_PREFIX: &str = "Missing Required Parameter";
const INVALID_PARAMETER_PREFIX: &str = "Invalid Parameter";

/// Request details echoed back in error bodies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// HTTP method
    pub method: String,
    /// Host header
    pub host: String,
    /// Path and query as received
    pub original_url: String,
    /// Request identifier
    pub request_id: String,
    /// Service handling the request; `Tile` when absent
    pub service_name: Option<String>,
}

impl RequestContext {
    /// Create a context without a service name
    pub fn new(
        method: impl Into<String>,
        host: impl Into<String>,
        original_url: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            host: host.into(),
            original_url: original_url.into(),
            request_id: request_id.into(),
            service_name: None,
        }
    }

    /// Set the service name
    pub fn with_service(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Effective service name
    pub fn service(&self) -> &str {
        self.service_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVICE)
    }

    fn api_info(&self) -> ApiInfo {
        ApiInfo {
            uri: format!("{}{}", self.host, self.original_url),
            method: format!("{} {}", self.method, self.original_url),
            request_id: self.request_id.clone(),
        }
    }
}

/// `api_info` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    /// Host plus original URL
    pub uri: String,
    /// Method plus original URL
    pub method: String,
    /// Request identifier
    pub request_id: String,
}

/// `error` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message
    pub message: String,
    /// Structured details; `null` when none
    pub data: Option<Value>,
}

/// Serialized error body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `"error"`
    pub success: String,
    /// Request echo
    pub api_info: ApiInfo,
    /// Error details
    pub error: ErrorDetail,
    /// Generated error code; absent on the degrade path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// Status plus body, ready for the HTTP layer
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// HTTP status
    pub status: u16,
    /// JSON body
    pub body: ErrorBody,
}

impl ErrorResponse {
    /// Body as a JSON value
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.body).unwrap_or(Value::Null)
    }
}

/// Extract `{ "property": ... }` from well-known validation messages
pub fn error_data(message: &str) -> Option<Value> {
    let property = if message.starts_with(MISSING_PARAMETER_PREFIX) {
        message.split_whitespace().nth(3).map(str::to_string)
    } else if message.starts_with(INVALID_PARAMETER_PREFIX) {
        quoted_text(message)
    } else {
        None
    }?;
    Some(serde_json::json!({ "property": property }))
}

// text between the first and the last quote character
fn quoted_text(message: &str) -> Option<String> {
    let is_quote = |c: char| c == '\'' || c == '"';
    let start = message.find(is_quote)?;
    let end = message.rfind(is_quote)?;
    if end <= start {
        return None;
    }
    Some(message[start + 1..end].to_string())
}

/// Error response formatter
#[derive(Debug, Clone)]
pub struct ErrorResponder {
    generator: ErrorCodeGenerator,
}

impl ErrorResponder {
    /// Create a responder
    pub fn new(generator: ErrorCodeGenerator) -> Self {
        Self { generator }
    }

    /// Build the error response for a failed request
    ///
    /// Statuses outside `100..=599` become 500 with the fallback message.
    /// `data` overrides what [`error_data`] would extract from the message.
    pub async fn respond(
        &self,
        ctx: &RequestContext,
        message: &str,
        status: u16,
        data: Option<Value>,
    ) -> ErrorResponse {
        let (status, message) = if (100..=599).contains(&status) {
            (status, message.to_string())
        } else {
            (500, FALLBACK_MESSAGE.to_string())
        };
        let data = data.or_else(|| error_data(&message));
        let mut body = ErrorBody {
            success: "error".to_string(),
            api_info: ctx.api_info(),
            error: ErrorDetail { message, data },
            error_code: None,
        };

        match self
            .generator
            .build_error_code(ctx.service(), status, &ctx.request_id)
            .await
        {
            Ok(code) => {
                body.error_code = Some(code);
                ErrorResponse { status, body }
            }
            Err(e) => {
                tracing::warn!(
                    target: "tideline::error_code",
                    error = %e,
                    request_id = %ctx.request_id,
                    service = ctx.service(),
                    "error code generation failed, sending fallback response"
                );
                body.error.message = FALLBACK_MESSAGE.to_string();
                ErrorResponse { status: 500, body }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::SequenceSource;
    use crate::services::ServiceRegistry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tideline_core::{StoreError, TidelineResult};

    struct Sequence(Option<u32>);

    #[async_trait]
    impl SequenceSource for Sequence {
        async fn next_value(&self, _key: &str) -> TidelineResult<u32> {
            match self.0 {
                Some(v) => Ok(v),
                None => Err(StoreError::backend("connection reset").into()),
            }
        }
    }

    fn responder(value: Option<u32>) -> ErrorResponder {
        ErrorResponder::new(ErrorCodeGenerator::new(
            Arc::new(ServiceRegistry::new()),
            Arc::new(Sequence(value)),
        ))
    }

    fn ctx() -> RequestContext {
        RequestContext::new("GET", "api.example.com", "/tiles/7?z=3", "req-1")
    }

    #[test]
    fn test_error_data_missing_parameter() {
        assert_eq!(
            error_data("Missing Required Parameter userId in body"),
            Some(json!({"property": "userId"}))
        );
        assert_eq!(error_data("Missing Required Parameter"), None);
    }

    #[test]
    fn test_error_data_invalid_parameter() {
        assert_eq!(
            error_data("Invalid Parameter 'zoom': must be positive"),
            Some(json!({"property": "zoom"}))
        );
        assert_eq!(
            error_data(r#"Invalid Parameter "lat" or "lng""#),
            Some(json!({"property": r#"lat" or "lng"#}))
        );
        assert_eq!(error_data("Invalid Parameter zoom"), None);
    }

    #[test]
    fn test_error_data_other_messages() {
        assert_eq!(error_data("Not Found"), None);
    }

    #[tokio::test]
    async fn test_body_shape() {
        let response = responder(Some(3))
            .respond(&ctx().with_service("Images"), "Not Found", 404, None)
            .await;
        assert_eq!(response.status, 404);
        assert_eq!(
            response.to_json(),
            json!({
                "success": "error",
                "api_info": {
                    "uri": "api.example.com/tiles/7?z=3",
                    "method": "GET /tiles/7?z=3",
                    "request_id": "req-1"
                },
                "error": { "message": "Not Found", "data": null },
                "error_code": "IG-0404"
            })
        );
    }

    #[tokio::test]
    async fn test_service_defaults_to_tile() {
        let response = responder(Some(12)).respond(&ctx(), "Bad Request", 400, None).await;
        assert_eq!(response.body.error_code.as_deref(), Some("TL-1012"));
    }

    #[tokio::test]
    async fn test_invalid_status_becomes_500() {
        let response = responder(Some(1)).respond(&ctx(), "weird", 42, None).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body.error.message, FALLBACK_MESSAGE);
        assert_eq!(response.body.error_code.as_deref(), Some("TL-0500"));
    }

    #[tokio::test]
    async fn test_caller_data_takes_precedence() {
        let response = responder(Some(1))
            .respond(
                &ctx(),
                "Missing Required Parameter userId",
                422,
                Some(json!({"fields": ["a"]})),
            )
            .await;
        assert_eq!(response.body.error.data, Some(json!({"fields": ["a"]})));
    }

    #[tokio::test]
    async fn test_degrades_when_counter_fails() {
        let response = responder(None).respond(&ctx(), "Bad Request", 400, None).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body.error.message, FALLBACK_MESSAGE);
        assert!(response.body.error_code.is_none());
        assert!(response.to_json().get("error_code").is_none());
    }

    #[tokio::test]
    async fn test_server_error_does_not_need_counter() {
        let response = responder(None).respond(&ctx(), "Upstream down", 502, None).await;
        assert_eq!(response.status, 502);
        assert_eq!(response.body.error_code.as_deref(), Some("TL-0502"));
    }
}
