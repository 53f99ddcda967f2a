//! Remote gateways to the TradeHub backend.
//!
//! # Architecture
//!
//! - Thin request wrappers over `reqwest`; no retry logic here - the cart
//!   synchronizer owns the retry policy per error class
//! - Each gateway is a trait so tests substitute mocks behind `Arc<dyn _>`
//! - Response statuses are classified into [`GatewayError`]'s taxonomy at
//!   this boundary; callers never see raw status codes

mod cart;
mod session;

pub use cart::{CartGateway, HttpCartGateway, RemoteCart};
pub use session::{AuthGrant, HttpSessionGateway, SessionGateway};

use thiserror::Error;

/// Errors that can occur when talking to the TradeHub backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The resource does not exist (e.g., no server-held cart yet).
    #[error("not found")]
    NotFound,

    /// The credential was rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// The credential is valid but lacks access.
    #[error("forbidden")]
    Forbidden,

    /// Rate limited by the backend.
    #[error("rate limited, retry after {retry_after} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, from the `Retry-After` header.
        retry_after: u64,
    },

    /// HTTP request failed (network, TLS, timeout at the transport layer).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Any other non-success response.
    #[error("unexpected status {status}: {body}")]
    Unexpected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },
}

impl GatewayError {
    /// Build an `Unexpected` error, truncating the body for diagnostics.
    pub(crate) fn unexpected(status: reqwest::StatusCode, body: &str) -> Self {
        Self::Unexpected {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        }
    }
}

/// Classify a non-success status into the gateway taxonomy.
///
/// Returns `None` for statuses that need response context (rate limiting
/// reads `Retry-After`; unexpected statuses carry the body).
pub(crate) fn classify_status(status: reqwest::StatusCode) -> Option<GatewayError> {
    match status {
        reqwest::StatusCode::NOT_FOUND => Some(GatewayError::NotFound),
        reqwest::StatusCode::UNAUTHORIZED => Some(GatewayError::Unauthorized),
        reqwest::StatusCode::FORBIDDEN => Some(GatewayError::Forbidden),
        _ => None,
    }
}

/// Parse the `Retry-After` header from a rate-limited response.
pub(crate) fn retry_after_secs(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1)
}
