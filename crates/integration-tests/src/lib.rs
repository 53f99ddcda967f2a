//! Integration test harness for the TradeHub client core.
//!
//! Provides mock gateways, a recording navigator, and fixture builders
//! shared by the test files in `tests/`. The mocks cover the three shapes
//! the core's properties need:
//!
//! - [`ScriptedCartGateway`] - returns a queued sequence of results,
//!   optionally delayed, and counts calls
//! - [`BlockingCartGateway`] - parks each fetch until the test releases
//!   it, for exercising logout races against in-flight requests
//! - [`StaticSessionGateway`] - hands out a fixed identity and token

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Notify;

use tradehub_client::gate::Navigator;
use tradehub_client::gateway::{AuthGrant, CartGateway, GatewayError, RemoteCart, SessionGateway};
use tradehub_client::session::Identity;
use tradehub_core::{
    AccessToken, CartItem, CurrencyCode, Price, ProductId, Role, UserId, VendorId,
};

/// Initialize test logging once per process.
///
/// Honors `RUST_LOG`; defaults to warnings so degraded-path logs are
/// visible when a test fails.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradehub_client=warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Build a cart item fixture.
#[must_use]
pub fn test_item(product: &str, qty: u32) -> CartItem {
    CartItem {
        product_id: ProductId::new(product),
        vendor_id: VendorId::new("vnd_acme"),
        title: format!("Item {product}"),
        price_per_unit: Price::new(Decimal::new(1999, 2), CurrencyCode::USD),
        qty,
        min_order_qty: 1,
        image_url: None,
    }
}

/// Build an identity fixture.
#[must_use]
pub fn test_identity(role: Role) -> Identity {
    Identity {
        id: UserId::new("usr_test"),
        role,
        email_verified: true,
        approved: true,
    }
}

/// Cart gateway returning a scripted sequence of results.
///
/// Each fetch pops the next scripted result; once the script is exhausted,
/// fetches succeed with the fallback items. An optional delay keeps
/// requests in flight long enough for concurrent triggers to overlap.
pub struct ScriptedCartGateway {
    script: Mutex<VecDeque<Result<RemoteCart, GatewayError>>>,
    fallback: Vec<CartItem>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedCartGateway {
    /// Gateway that always succeeds with the given items.
    #[must_use]
    pub fn always(items: Vec<CartItem>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: items,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Gateway that plays the given results in order, then succeeds with
    /// an empty cart.
    #[must_use]
    pub fn scripted(results: Vec<Result<RemoteCart, GatewayError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            fallback: Vec::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delay every fetch by the given duration.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of fetches issued so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CartGateway for ScriptedCartGateway {
    async fn fetch_cart(&self, _token: &AccessToken) -> Result<RemoteCart, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Ok(RemoteCart {
                    items: self.fallback.clone(),
                })
            })
    }
}

/// Cart gateway that parks each fetch until the test releases it.
pub struct BlockingCartGateway {
    entered: Notify,
    release: Notify,
    result_items: Vec<CartItem>,
    calls: AtomicUsize,
    /// Only the first fetch blocks; later fetches return immediately.
    block_first_only: bool,
}

impl BlockingCartGateway {
    /// Gateway whose every fetch blocks until [`release`](Self::release).
    #[must_use]
    pub fn new(result_items: Vec<CartItem>) -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
            result_items,
            calls: AtomicUsize::new(0),
            block_first_only: false,
        }
    }

    /// Block only the first fetch; later fetches resolve immediately.
    #[must_use]
    pub fn blocking_first_only(mut self) -> Self {
        self.block_first_only = true;
        self
    }

    /// Wait until a fetch is parked inside the gateway.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Release one parked fetch.
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Number of fetches issued so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CartGateway for BlockingCartGateway {
    async fn fetch_cart(&self, _token: &AccessToken) -> Result<RemoteCart, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 || !self.block_first_only {
            self.entered.notify_one();
            // notify_one stores a permit, so a release racing this await
            // is not lost
            self.release.notified().await;
        }
        Ok(RemoteCart {
            items: self.result_items.clone(),
        })
    }
}

/// Session gateway handing out a fixed identity and token.
pub struct StaticSessionGateway {
    role: Role,
    logouts: AtomicUsize,
    refreshes: AtomicUsize,
}

impl StaticSessionGateway {
    /// Gateway granting the given role on every login.
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self {
            role,
            logouts: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Number of server-side logouts performed.
    #[must_use]
    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    /// Number of token refreshes performed.
    #[must_use]
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionGateway for StaticSessionGateway {
    async fn login(&self, email: &str, _password: &str) -> Result<AuthGrant, GatewayError> {
        if email == "wrong@example.com" {
            return Err(GatewayError::Unauthorized);
        }
        Ok(AuthGrant {
            identity: test_identity(self.role),
            access_token: AccessToken::new("tok_static"),
        })
    }

    async fn refresh(&self, _token: &AccessToken) -> Result<AccessToken, GatewayError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new(format!("tok_refreshed_{n}")))
    }

    async fn logout(&self, _token: &AccessToken) -> Result<(), GatewayError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Navigator that records redirects instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    path: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Navigator currently at the given path.
    #[must_use]
    pub fn at(path: &str) -> Self {
        Self {
            path: Mutex::new(path.to_owned()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    /// All redirects performed, in order.
    #[must_use]
    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn redirect_to(&self, path: &str) {
        let mut redirects = self
            .redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        redirects.push(path.to_owned());
        // the navigator is now at the new location
        *self.path.lock().unwrap_or_else(PoisonError::into_inner) = path.to_owned();
    }
}
