//! Remote cart gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tradehub_core::{AccessToken, CartItem};

use crate::config::ClientConfig;
use crate::gateway::{GatewayError, classify_status, retry_after_secs};

/// The server-held cart, as returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteCart {
    /// Cart line items. The JSON shape passes through structurally.
    pub items: Vec<CartItem>,
}

/// Read access to the server-held cart.
///
/// Reconciliation only ever reads; requests are idempotent, which is what
/// makes result-discarding a safe substitute for cancellation.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Fetch the cart held for the given credential.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`GatewayError`] classes; `NotFound` means the
    /// backend holds no cart for this account yet.
    async fn fetch_cart(&self, token: &AccessToken) -> Result<RemoteCart, GatewayError>;
}

/// `reqwest`-backed [`CartGateway`] implementation.
pub struct HttpCartGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCartGateway {
    /// Create a gateway from client configuration.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let endpoint = format!(
            "{}/api/v1/cart",
            config.api_base_url.as_str().trim_end_matches('/')
        );

        Self {
            client: reqwest::Client::builder()
                .timeout(config.http_timeout)
                .build()
                .unwrap_or_default(),
            endpoint,
        }
    }
}

#[async_trait]
impl CartGateway for HttpCartGateway {
    #[instrument(skip(self, token))]
    async fn fetch_cart(&self, token: &AccessToken) -> Result<RemoteCart, GatewayError> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token.expose())
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited {
                retry_after: retry_after_secs(&response),
            });
        }

        if let Some(err) = classify_status(status) {
            return Err(err);
        }

        // Read the body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "cart fetch returned non-success status"
            );
            return Err(GatewayError::unexpected(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "failed to parse cart response"
            );
            GatewayError::Parse(e)
        })
    }
}
