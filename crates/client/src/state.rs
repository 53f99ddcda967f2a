//! Client state shared across screens.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::ClientConfig;
use crate::gateway::{
    CartGateway, GatewayError, HttpCartGateway, HttpSessionGateway, SessionGateway,
};
use crate::session::SessionHandle;
use crate::sync::CartSynchronizer;

/// Client state shared across all screens.
///
/// This struct is cheaply cloneable via `Arc` and is passed explicitly to
/// every component that needs session, gateway, or synchronizer access -
/// there is no ambient global state.
#[derive(Clone)]
pub struct ClientState {
    inner: Arc<ClientStateInner>,
}

struct ClientStateInner {
    config: ClientConfig,
    session: SessionHandle,
    session_gateway: Arc<dyn SessionGateway>,
    synchronizer: Arc<CartSynchronizer>,
}

impl ClientState {
    /// Create client state with HTTP gateways from configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let cart_gateway = Arc::new(HttpCartGateway::new(&config));
        let session_gateway = Arc::new(HttpSessionGateway::new(&config));
        Self::with_gateways(config, cart_gateway, session_gateway)
    }

    /// Create client state over explicit gateways (tests inject mocks here).
    #[must_use]
    pub fn with_gateways(
        config: ClientConfig,
        cart_gateway: Arc<dyn CartGateway>,
        session_gateway: Arc<dyn SessionGateway>,
    ) -> Self {
        let session = SessionHandle::new();
        let synchronizer = Arc::new(CartSynchronizer::new(
            session.clone(),
            cart_gateway,
            config.cart_sync_timeout,
        ));

        Self {
            inner: Arc::new(ClientStateInner {
                config,
                session,
                session_gateway,
                synchronizer,
            }),
        }
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get the session handle.
    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.inner.session
    }

    /// Get the cart synchronizer.
    #[must_use]
    pub fn synchronizer(&self) -> &Arc<CartSynchronizer> {
        &self.inner.synchronizer
    }

    /// Spawn the background task that reconciles the cart on every session
    /// transition.
    pub fn spawn_cart_sync(&self) -> JoinHandle<()> {
        let synchronizer = self.inner.synchronizer.clone();
        tokio::spawn(async move { synchronizer.watch().await })
    }

    /// Sign in: exchange credentials for a grant and update the session.
    ///
    /// # Errors
    ///
    /// Returns the gateway error on failure; the session is left unchanged.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), GatewayError> {
        let grant = self.inner.session_gateway.login(email, password).await?;
        self.inner.session.login(grant.identity, grant.access_token);
        Ok(())
    }

    /// Sign out: reset the session, then invalidate the credential
    /// server-side.
    ///
    /// The local reset happens first and unconditionally - logout dominates
    /// any in-flight work - so a failing backend call only means the token
    /// dies by expiry instead.
    pub async fn sign_out(&self) {
        let token = self.inner.session.snapshot().access_token;
        self.inner.session.logout();

        if let Some(token) = token {
            if let Err(e) = self.inner.session_gateway.logout(&token).await {
                warn!(error = %e, "server-side logout failed; token will expire on its own");
            }
        }
    }

    /// Refresh the access credential in place.
    ///
    /// Does not disturb cart synchronization: the login lifetime is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns the gateway error on failure; the session keeps the old
    /// token.
    pub async fn refresh_credential(&self) -> Result<(), GatewayError> {
        let Some(token) = self.inner.session.snapshot().access_token else {
            return Ok(());
        };
        let fresh = self.inner.session_gateway.refresh(&token).await?;
        self.inner.session.refresh_token(fresh);
        Ok(())
    }
}
