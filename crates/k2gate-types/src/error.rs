//! Gateway error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while serving a gateway request or maintaining
/// the token pool.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum GatewayError {
    /// Token source parsed to zero credentials
    #[error("Token pool would be empty: {reason}")]
    EmptyPool { reason: String },

    /// Every enabled token has been tried (or none is enabled)
    #[error("No enabled token available: {reason}")]
    PoolExhausted { reason: String },

    /// Upstream network error or 5xx
    #[error("Upstream unavailable: {message}")]
    UpstreamTransport { message: String },

    /// Upstream rejected the credential (401/403)
    #[error("Upstream rejected credential: {message}")]
    UpstreamAuth { message: String },

    /// Upstream request timed out
    #[error("Request timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Credential generation produced no usable tokens
    #[error("Refresh validation failed: {message}")]
    RefreshValidation { message: String },

    /// The atomic file replacement sequence failed
    #[error("Refresh swap failed: {message}")]
    RefreshSwap { message: String },

    /// tool_choice demanded a call the model did not produce
    #[error("Tool extraction failed: {message}")]
    ToolExtraction { message: String },

    /// Client presented a missing or wrong shared API key
    #[error("Invalid API key provided")]
    InvalidApiKey,

    /// Request body failed validation
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Internal gateway error (bugs, unexpected states)
    #[error("Internal gateway error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Whether a dispatch attempt that hit this error should be recorded
    /// against the token and retried with the next one.
    pub fn counts_against_token(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTransport { .. } | Self::UpstreamAuth { .. } | Self::Timeout { .. }
        )
    }

    /// HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::EmptyPool { .. } => 503,
            Self::PoolExhausted { .. } => 503,
            Self::UpstreamTransport { .. } => 502,
            Self::UpstreamAuth { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::RefreshValidation { .. } | Self::RefreshSwap { .. } => 500,
            Self::ToolExtraction { .. } => 500,
            Self::InvalidApiKey => 401,
            Self::InvalidRequest { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }

    /// OpenAI-style `error.type` string.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidApiKey => "authentication_error",
            Self::InvalidRequest { .. } => "invalid_request_error",
            Self::Timeout { .. } => "timeout_error",
            Self::UpstreamTransport { .. } | Self::UpstreamAuth { .. } => "upstream_error",
            Self::ToolExtraction { .. } => "tool_extraction_error",
            _ => "api_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            GatewayError::PoolExhausted { reason: "all disabled".to_string() }.http_status_code(),
            503
        );
        assert_eq!(GatewayError::InvalidApiKey.http_status_code(), 401);
        assert_eq!(GatewayError::Timeout { duration_secs: 60 }.http_status_code(), 504);
    }

    #[test]
    fn test_counts_against_token() {
        let auth = GatewayError::UpstreamAuth { message: "401".to_string() };
        let exhausted = GatewayError::PoolExhausted { reason: "empty".to_string() };

        assert!(auth.counts_against_token());
        assert!(!exhausted.counts_against_token());
    }
}
