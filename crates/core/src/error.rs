use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for all proxy operations, mapped to OpenAI-shaped
/// error envelopes at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited")]
    RateLimited { body: Option<String> },

    #[error("upstream error (status {status}): {body}")]
    UpstreamError { status: u16, body: String },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            // Always 502 regardless of the upstream's reported status — the
            // client talks to this proxy, not to OpenRouter directly, and
            // an upstream 5xx is this proxy's own gateway failure.
            Self::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
            Self::NetworkError(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotConfigured(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Unauthorized(_) | Self::NotConfigured(_) => "authentication_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::UpstreamError { .. } => "upstream_error",
            Self::NetworkError(_) => "network_error",
            Self::Internal(_) => "server_error",
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Unauthorized(_) => "invalid_api_key",
            Self::NotConfigured(_) => "not_configured",
            Self::RateLimited { .. } => "rate_limit_exceeded",
            Self::UpstreamError { .. } => "upstream_error",
            Self::NetworkError(_) => "network_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether this error is client-caused (logged at warn) vs
    /// server/upstream-caused (logged at error).
    pub fn is_client_caused(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::Unauthorized(_) | Self::NotConfigured(_)
        )
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        if self.is_client_caused() {
            tracing::warn!(error = %self, "request rejected");
        } else {
            tracing::error!(error = %self, "request failed");
        }

        let status = self.status_code();

        // Upstream errors and rate limits forward the original body verbatim
        // when it's already a JSON document, per the error-forwarding rule.
        match &self {
            Self::UpstreamError { body, .. } if serde_json::from_str::<serde_json::Value>(body).is_ok() => {
                return (status, [("content-type", "application/json")], body.clone())
                    .into_response();
            }
            Self::RateLimited { body: Some(body) }
                if serde_json::from_str::<serde_json::Value>(body).is_ok() =>
            {
                return (status, [("content-type", "application/json")], body.clone())
                    .into_response();
            }
            _ => {}
        }

        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type(),
                "code": self.error_code(),
            }
        });

        (
            status,
            [("content-type", "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::NetworkError(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::NetworkError(format!("connection failed: {e}"))
        } else {
            Self::NetworkError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidRequest(format!("JSON error: {e}"))
    }
}
