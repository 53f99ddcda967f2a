//! Remote session gateway.
//!
//! The only source of session lifecycle events: login success, logout, and
//! token refresh. [`crate::session::SessionHandle`] mutations are driven
//! exclusively from these results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tradehub_core::AccessToken;

use crate::config::ClientConfig;
use crate::gateway::{GatewayError, classify_status, retry_after_secs};
use crate::session::Identity;

/// A successful authentication: the identity plus its credential.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    /// The authenticated identity.
    pub identity: Identity,
    /// The access credential for subsequent requests.
    pub access_token: AccessToken,
}

/// Session lifecycle operations against the backend.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Exchange credentials for an identity and access token.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for bad credentials; other [`GatewayError`] classes
    /// for transport and backend failures.
    async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, GatewayError>;

    /// Exchange a still-valid token for a fresh one.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when the token has already expired.
    async fn refresh(&self, token: &AccessToken) -> Result<AccessToken, GatewayError>;

    /// Invalidate the credential server-side.
    ///
    /// # Errors
    ///
    /// Transport and backend failures; callers treat this as best-effort
    /// since the local session is reset regardless.
    async fn logout(&self, token: &AccessToken) -> Result<(), GatewayError>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct GrantResponse {
    identity: Identity,
    access_token: String,
}

/// `reqwest`-backed [`SessionGateway`] implementation.
pub struct HttpSessionGateway {
    client: reqwest::Client,
    base: String,
}

impl HttpSessionGateway {
    /// Create a gateway from client configuration.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.http_timeout)
                .build()
                .unwrap_or_default(),
            base: format!(
                "{}/api/v1/auth",
                config.api_base_url.as_str().trim_end_matches('/')
            ),
        }
    }

    /// Classify a response, returning the body text on success.
    async fn check(response: reqwest::Response) -> Result<String, GatewayError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited {
                retry_after: retry_after_secs(&response),
            });
        }

        if let Some(err) = classify_status(status) {
            return Err(err);
        }

        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "auth request returned non-success status"
            );
            return Err(GatewayError::unexpected(status, &body));
        }

        Ok(body)
    }
}

#[async_trait]
impl SessionGateway for HttpSessionGateway {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, GatewayError> {
        let response = self
            .client
            .post(format!("{}/login", self.base))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let body = Self::check(response).await?;
        let grant: GrantResponse = serde_json::from_str(&body)?;

        Ok(AuthGrant {
            identity: grant.identity,
            access_token: AccessToken::new(grant.access_token),
        })
    }

    #[instrument(skip(self, token))]
    async fn refresh(&self, token: &AccessToken) -> Result<AccessToken, GatewayError> {
        let response = self
            .client
            .post(format!("{}/refresh", self.base))
            .bearer_auth(token.expose())
            .send()
            .await?;

        let body = Self::check(response).await?;

        #[derive(Deserialize)]
        struct RefreshResponse {
            access_token: String,
        }

        let refreshed: RefreshResponse = serde_json::from_str(&body)?;
        Ok(AccessToken::new(refreshed.access_token))
    }

    #[instrument(skip(self, token))]
    async fn logout(&self, token: &AccessToken) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(format!("{}/logout", self.base))
            .bearer_auth(token.expose())
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}
