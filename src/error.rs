use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Error taxonomy for the forwarding pipeline.
///
/// Upstream non-2xx statuses are not errors here: the pipeline relays them
/// verbatim (expired-link statuses must reach the player untouched). Only
/// local validation failures and network-level fetch failures surface as
/// `RelayError`.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No `url` query parameter on the proxy route
    #[error("Missing url query parameter")]
    MissingTarget,

    /// Target is present but not an acceptable absolute HTTP(S) URL
    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    /// Connection failure, DNS failure, or broken body read with no
    /// upstream response to relay
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(#[from] reqwest::Error),

    /// Upstream did not produce response headers within the fetch timeout
    #[error("Upstream fetch timed out after {0} seconds")]
    UpstreamTimeout(u64),
}

impl RelayError {
    fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingTarget | RelayError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamFetch(_) | RelayError::UpstreamTimeout(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            RelayError::MissingTarget => "missing_url",
            RelayError::InvalidTarget(_) => "invalid_url",
            RelayError::UpstreamFetch(_) => "upstream_unreachable",
            RelayError::UpstreamTimeout(_) => "upstream_timeout",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail (connection errors carry resolved addresses) stays
        // in the logs; clients get the category and a short message.
        let message = match &self {
            RelayError::UpstreamFetch(e) => {
                tracing::error!("Upstream fetch failed: {}", e);
                "Failed to fetch upstream resource".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
            "code": self.code(),
        });

        (status, Json(body)).into_response()
    }
}
