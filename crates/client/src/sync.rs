//! Cart synchronization.
//!
//! Guarantees at most one in-flight reconciliation of the local cart
//! against the server-held cart per session epoch, and exactly one
//! successful reconciliation before the cart is trusted as authoritative.
//!
//! # Concurrency
//!
//! Multiple logical requesters (screen mounts, navigation events, the
//! session watcher) can race to trigger the same reconciliation. The watch
//! channel's `Syncing` state alone cannot close that race: the state update
//! is not atomic with the decision to start work. An out-of-band latch
//! (outside the published session state) suppresses duplicate triggers in
//! that window.
//!
//! # Epoch discipline
//!
//! Every attempt is tagged with the [`SessionEpoch`] it was issued under.
//! A logout bumps the epoch, so a late-arriving response for the previous
//! login is discarded instead of overwriting post-logout state. There is no
//! network cancellation; discarding stale results is sufficient because
//! cart fetches are idempotent reads.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use tradehub_core::CartSyncState;

use crate::gateway::{CartGateway, GatewayError, RemoteCart};
use crate::session::{SessionEpoch, SessionHandle, SyncFailure};

/// What a call to [`CartSynchronizer::ensure_synced`] did.
///
/// Reconciliation never surfaces errors to the caller; every outcome
/// resolves into session state, and this report exists for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A reconciliation ran and settled the session (server items applied,
    /// or a terminal failure presented as an empty cart).
    Applied,
    /// The cart is already reconciled for this epoch.
    AlreadySynced,
    /// No identity or credential; nothing to reconcile.
    NotAuthenticated,
    /// Another reconciliation for this epoch is in flight.
    InFlight,
    /// A transient failure (rate limit or timeout); the session stays
    /// unsynced and a later trigger may retry.
    RetryLater,
    /// The session epoch changed mid-flight; the result was discarded.
    StaleEpoch,
}

/// Reconciles the local cart against the server-held cart.
pub struct CartSynchronizer {
    session: SessionHandle,
    gateway: Arc<dyn CartGateway>,
    timeout: Duration,
    /// In-flight latch, keyed by the epoch that acquired it.
    ///
    /// Lives outside the session watch state so the window between
    /// "decided to sync" and "Syncing became visible" is closed. Release is
    /// compare-and-clear: a stale attempt finishing late cannot free a
    /// latch that a newer epoch's attempt holds.
    latch: Mutex<Option<SessionEpoch>>,
}

impl CartSynchronizer {
    /// Create a synchronizer over the given session and gateway.
    ///
    /// `timeout` bounds a single reconciliation attempt so `Syncing` can
    /// never be left dangling by a hung remote call.
    #[must_use]
    pub fn new(session: SessionHandle, gateway: Arc<dyn CartGateway>, timeout: Duration) -> Self {
        Self {
            session,
            gateway,
            timeout,
            latch: Mutex::new(None),
        }
    }

    /// Reconcile the cart if this session epoch still needs it.
    ///
    /// Safe to call from every screen mount: repeated calls while already
    /// synced or in flight are no-ops. All failures resolve into session
    /// state per the error-class policy; this method never returns an error.
    #[instrument(skip(self))]
    pub async fn ensure_synced(&self) -> SyncOutcome {
        let snapshot = self.session.snapshot();

        let Some(token) = snapshot.access_token.clone() else {
            return SyncOutcome::NotAuthenticated;
        };
        if snapshot.user.is_none() {
            return SyncOutcome::NotAuthenticated;
        }

        match snapshot.cart_sync {
            CartSyncState::Synced => return SyncOutcome::AlreadySynced,
            CartSyncState::Syncing => return SyncOutcome::InFlight,
            CartSyncState::Unsynced => {}
        }

        let epoch = snapshot.epoch;

        if !self.try_acquire(epoch) {
            return SyncOutcome::InFlight;
        }

        // The session may have moved between the snapshot and the latch
        // acquisition; begin_sync re-checks under the current state.
        if !self.session.begin_sync(epoch) {
            self.release(epoch);
            return SyncOutcome::StaleEpoch;
        }

        debug!(epoch = %epoch, "cart reconciliation started");

        let result = tokio::time::timeout(self.timeout, self.gateway.fetch_cart(&token)).await;

        let outcome = match result {
            Ok(result) => self.apply(epoch, result),
            Err(_elapsed) => {
                warn!(epoch = %epoch, timeout_secs = self.timeout.as_secs(), "cart reconciliation timed out");
                self.settle(epoch, SyncFailure::RetryLater, SyncOutcome::RetryLater)
            }
        };

        self.release(epoch);
        outcome
    }

    /// Observe session transitions and reconcile on each one.
    ///
    /// Runs until the session handle is dropped. Login and token refresh
    /// both publish transitions, so this drives the "sync once after
    /// login" behavior without every screen wiring its own trigger.
    pub async fn watch(&self) {
        let mut rx = self.session.subscribe();
        loop {
            self.ensure_synced().await;
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Apply a settled gateway result according to the error-class policy.
    fn apply(
        &self,
        epoch: SessionEpoch,
        result: Result<RemoteCart, GatewayError>,
    ) -> SyncOutcome {
        match result {
            // Server cart is authoritative; local pre-login items are
            // discarded, not merged.
            Ok(cart) => {
                let count = cart.items.len();
                if self.session.apply_sync_success(epoch, cart.items) {
                    debug!(epoch = %epoch, items = count, "cart reconciled");
                    SyncOutcome::Applied
                } else {
                    SyncOutcome::StaleEpoch
                }
            }
            // No server-held cart yet: an empty cart, not an error.
            Err(GatewayError::NotFound) => {
                if self.session.apply_sync_success(epoch, Vec::new()) {
                    debug!(epoch = %epoch, "no server cart, reconciled as empty");
                    SyncOutcome::Applied
                } else {
                    SyncOutcome::StaleEpoch
                }
            }
            // Session-invalidating: stay unsynced so a re-authenticated
            // session retries.
            Err(err @ (GatewayError::Unauthorized | GatewayError::Forbidden)) => {
                warn!(epoch = %epoch, error = %err, "cart fetch rejected; retry after re-auth");
                self.settle(epoch, SyncFailure::DiscardAndRetry, SyncOutcome::Applied)
            }
            // Transient: leave items untouched, permit retry.
            Err(err @ GatewayError::RateLimited { .. }) => {
                warn!(epoch = %epoch, error = %err, "cart fetch rate limited");
                self.settle(epoch, SyncFailure::RetryLater, SyncOutcome::RetryLater)
            }
            // Terminal for this epoch: present an empty cart and mark
            // synced so re-render storms cannot retry into a failing
            // backend.
            Err(err) => {
                warn!(epoch = %epoch, error = %err, "cart fetch failed; presenting empty cart");
                self.settle(epoch, SyncFailure::DiscardAndSettle, SyncOutcome::Applied)
            }
        }
    }

    fn settle(
        &self,
        epoch: SessionEpoch,
        failure: SyncFailure,
        outcome: SyncOutcome,
    ) -> SyncOutcome {
        if self.session.apply_sync_failure(epoch, failure) {
            outcome
        } else {
            SyncOutcome::StaleEpoch
        }
    }

    /// Acquire the in-flight latch for `epoch`.
    ///
    /// A latch still held by a *different* epoch is stolen: that attempt's
    /// result will be discarded by the epoch check anyway, and logout must
    /// never leave a dead latch blocking the next login's reconciliation.
    fn try_acquire(&self, epoch: SessionEpoch) -> bool {
        let mut guard = self.latch.lock().unwrap_or_else(PoisonError::into_inner);
        match *guard {
            Some(held) if held == epoch => false,
            Some(stale) => {
                debug!(stale = %stale, epoch = %epoch, "taking over latch from stale epoch");
                *guard = Some(epoch);
                true
            }
            None => {
                *guard = Some(epoch);
                true
            }
        }
    }

    /// Release the latch if `epoch` still holds it.
    fn release(&self, epoch: SessionEpoch) {
        let mut guard = self.latch.lock().unwrap_or_else(PoisonError::into_inner);
        if *guard == Some(epoch) {
            *guard = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use tradehub_core::{
        AccessToken, CartItem, CurrencyCode, Price, ProductId, Role, UserId, VendorId,
    };

    use super::*;
    use crate::session::Identity;

    struct StaticGateway {
        calls: AtomicUsize,
        result: fn() -> Result<RemoteCart, GatewayError>,
    }

    #[async_trait]
    impl CartGateway for StaticGateway {
        async fn fetch_cart(&self, _token: &AccessToken) -> Result<RemoteCart, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn server_item() -> CartItem {
        CartItem {
            product_id: ProductId::new("prd_srv"),
            vendor_id: VendorId::new("vnd_1"),
            title: "Server-side widgets".to_owned(),
            price_per_unit: Price::new(Decimal::new(100, 2), CurrencyCode::USD),
            qty: 50,
            min_order_qty: 50,
            image_url: None,
        }
    }

    fn logged_in_session() -> SessionHandle {
        let handle = SessionHandle::new();
        handle.login(
            Identity {
                id: UserId::new("usr_1"),
                role: Role::Customer,
                email_verified: true,
                approved: true,
            },
            AccessToken::new("tok_1"),
        );
        handle
    }

    fn synchronizer(
        session: &SessionHandle,
        result: fn() -> Result<RemoteCart, GatewayError>,
    ) -> (CartSynchronizer, Arc<StaticGateway>) {
        let gateway = Arc::new(StaticGateway {
            calls: AtomicUsize::new(0),
            result,
        });
        let sync = CartSynchronizer::new(
            session.clone(),
            gateway.clone(),
            Duration::from_millis(200),
        );
        (sync, gateway)
    }

    #[tokio::test]
    async fn test_anonymous_session_is_not_synced() {
        let session = SessionHandle::new();
        let (sync, gateway) = synchronizer(&session, || Ok(RemoteCart::default()));

        assert_eq!(sync.ensure_synced().await, SyncOutcome::NotAuthenticated);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_replaces_local_items() {
        let session = logged_in_session();
        session.add_item(server_item());
        let (sync, _) = synchronizer(&session, || {
            Ok(RemoteCart {
                items: vec![CartItem {
                    qty: 75,
                    ..server_item()
                }],
            })
        });

        assert_eq!(sync.ensure_synced().await, SyncOutcome::Applied);

        let s = session.snapshot();
        assert_eq!(s.cart_sync, CartSyncState::Synced);
        assert_eq!(s.items.len(), 1);
        assert_eq!(s.items.first().map(|i| i.qty), Some(75));
    }

    #[tokio::test]
    async fn test_repeat_calls_are_noops_once_synced() {
        let session = logged_in_session();
        let (sync, gateway) = synchronizer(&session, || Ok(RemoteCart::default()));

        assert_eq!(sync.ensure_synced().await, SyncOutcome::Applied);
        for _ in 0..10 {
            assert_eq!(sync.ensure_synced().await, SyncOutcome::AlreadySynced);
        }
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_an_empty_synced_cart() {
        let session = logged_in_session();
        session.add_item(server_item());
        let (sync, _) = synchronizer(&session, || Err(GatewayError::NotFound));

        assert_eq!(sync.ensure_synced().await, SyncOutcome::Applied);

        let s = session.snapshot();
        assert_eq!(s.cart_sync, CartSyncState::Synced);
        assert!(s.items.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_discards_items_but_permits_retry() {
        let session = logged_in_session();
        session.add_item(server_item());
        let (sync, _) = synchronizer(&session, || Err(GatewayError::Unauthorized));

        assert_eq!(sync.ensure_synced().await, SyncOutcome::Applied);

        let s = session.snapshot();
        assert_eq!(s.cart_sync, CartSyncState::Unsynced);
        assert!(s.items.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_leaves_state_untouched() {
        let session = logged_in_session();
        session.add_item(server_item());
        let (sync, gateway) = synchronizer(&session, || {
            Err(GatewayError::RateLimited { retry_after: 5 })
        });

        assert_eq!(sync.ensure_synced().await, SyncOutcome::RetryLater);

        let s = session.snapshot();
        assert_eq!(s.cart_sync, CartSyncState::Unsynced);
        assert_eq!(s.items.len(), 1);

        // the latch was released, so a later trigger retries
        assert_eq!(sync.ensure_synced().await, SyncOutcome::RetryLater);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_settle_as_empty_synced_cart() {
        let session = logged_in_session();
        session.add_item(server_item());
        let (sync, gateway) = synchronizer(&session, || {
            Err(GatewayError::Unexpected {
                status: 500,
                body: "boom".to_owned(),
            })
        });

        assert_eq!(sync.ensure_synced().await, SyncOutcome::Applied);

        let s = session.snapshot();
        assert_eq!(s.cart_sync, CartSyncState::Synced);
        assert!(s.items.is_empty());

        // no retry storm: the epoch is settled
        assert_eq!(sync.ensure_synced().await, SyncOutcome::AlreadySynced);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    struct HangingGateway;

    #[async_trait]
    impl CartGateway for HangingGateway {
        async fn fetch_cart(&self, _token: &AccessToken) -> Result<RemoteCart, GatewayError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reverts_to_unsynced() {
        let session = logged_in_session();
        let sync = CartSynchronizer::new(
            session.clone(),
            Arc::new(HangingGateway),
            Duration::from_secs(10),
        );

        assert_eq!(sync.ensure_synced().await, SyncOutcome::RetryLater);

        let s = session.snapshot();
        assert_eq!(s.cart_sync, CartSyncState::Unsynced);
    }

    #[tokio::test]
    async fn test_watch_syncs_after_login() {
        let session = SessionHandle::new();
        let (sync, gateway) = synchronizer(&session, || Ok(RemoteCart::default()));
        let sync = Arc::new(sync);

        let task = tokio::spawn({
            let sync = sync.clone();
            async move { sync.watch().await }
        });

        // give the watcher a chance to observe the anonymous state
        tokio::task::yield_now().await;

        session.login(
            Identity {
                id: UserId::new("usr_1"),
                role: Role::Customer,
                email_verified: true,
                approved: true,
            },
            AccessToken::new("tok_1"),
        );

        // wait for the watcher to settle the sync
        let mut rx = session.subscribe();
        while session.snapshot().cart_sync != CartSyncState::Synced {
            rx.changed().await.expect("session channel open");
        }

        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        task.abort();
    }
}
