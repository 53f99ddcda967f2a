//! Session state: the single source of truth for identity and cart status.
//!
//! All components read immutable [`Session`] snapshots and observe
//! transitions through a watch channel. Mutation funnels through
//! [`SessionHandle`]'s narrow API: [`login`](SessionHandle::login),
//! [`logout`](SessionHandle::logout),
//! [`refresh_token`](SessionHandle::refresh_token), the explicit cart item
//! operations, and the crate-internal synchronization transitions used by
//! [`crate::sync::CartSynchronizer`]. No component mutates another
//! component's derived state directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use tradehub_core::{AccessToken, CartItem, CartSyncState, ProductId, Role, UserId};

/// The authenticated identity attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Server-issued user ID.
    pub id: UserId,
    /// Marketplace role.
    pub role: Role,
    /// Whether the account's email address has been verified.
    pub email_verified: bool,
    /// Whether the account has passed marketplace approval (B2B onboarding).
    pub approved: bool,
}

/// A monotonically distinguishable login lifetime.
///
/// Bumped on login, logout, and identity change. In-flight asynchronous work
/// is tagged with the epoch it was issued under; results from a stale epoch
/// are discarded rather than applied to a newer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionEpoch(u64);

impl SessionEpoch {
    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for SessionEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable snapshot of session state.
///
/// Created at application bootstrap as anonymous; never destroyed, only
/// reset by [`SessionHandle::logout`].
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Current identity, or `None` when anonymous.
    pub user: Option<Identity>,
    /// Current access credential, or `None` when anonymous.
    pub access_token: Option<AccessToken>,
    /// Cart synchronization status for this epoch.
    pub cart_sync: CartSyncState,
    /// Locally held cart items.
    pub items: Vec<CartItem>,
    /// The session epoch this snapshot belongs to.
    pub epoch: SessionEpoch,
}

impl Session {
    /// Whether an identity and credential are both present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }

    /// The current role, if authenticated.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }
}

/// Disposition of a failed reconciliation attempt, decided by the
/// synchronizer's error-class policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncFailure {
    /// Discard local items and mark synced; no retry this epoch.
    DiscardAndSettle,
    /// Discard local items but stay unsynced; retry permitted after
    /// re-authentication.
    DiscardAndRetry,
    /// Leave items untouched and stay unsynced; retry permitted later.
    RetryLater,
}

/// Shared, cheaply cloneable handle to the session state.
///
/// Internally a watch channel: every transition publishes a fresh
/// [`Session`] snapshot to all subscribers.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Session>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// Create an anonymous session.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        Self { tx: Arc::new(tx) }
    }

    /// Current session snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Subscribe to session transitions.
    ///
    /// Every mutation through this handle publishes a new snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Record a successful login.
    ///
    /// Bumps the epoch and resets cart synchronization. Locally accumulated
    /// items are kept until reconciliation replaces them with the server
    /// cart.
    pub fn login(&self, identity: Identity, token: AccessToken) {
        self.tx.send_modify(|s| {
            debug!(user = %identity.id, role = %identity.role, "session login");
            s.user = Some(identity);
            s.access_token = Some(token);
            s.cart_sync = CartSyncState::Unsynced;
            s.epoch = s.epoch.next();
        });
    }

    /// Record a logout.
    ///
    /// Clears identity, credential, and cart items, resets synchronization,
    /// and bumps the epoch so in-flight work from the previous login is
    /// discarded on arrival.
    pub fn logout(&self) {
        self.tx.send_modify(|s| {
            debug!(epoch = %s.epoch, "session logout");
            s.user = None;
            s.access_token = None;
            s.cart_sync = CartSyncState::Unsynced;
            s.items.clear();
            s.epoch = s.epoch.next();
        });
    }

    /// Replace the access credential after a token refresh.
    ///
    /// Does not bump the epoch: the login lifetime is unchanged, so a cart
    /// already reconciled stays reconciled. Ignored for anonymous sessions.
    pub fn refresh_token(&self, token: AccessToken) {
        self.tx.send_modify(|s| {
            if s.user.is_some() {
                s.access_token = Some(token);
            } else {
                debug!("token refresh for anonymous session ignored");
            }
        });
    }

    /// Add an item to the local cart, merging quantities on duplicates.
    pub fn add_item(&self, item: CartItem) {
        self.tx.send_modify(|s| {
            if let Some(existing) = s
                .items
                .iter_mut()
                .find(|i| i.product_id == item.product_id)
            {
                existing.qty = existing.qty.saturating_add(item.qty);
            } else {
                s.items.push(item);
            }
        });
    }

    /// Set the quantity of a cart line. A quantity of zero removes the line.
    pub fn update_qty(&self, product_id: &ProductId, qty: u32) {
        self.tx.send_modify(|s| {
            if qty == 0 {
                s.items.retain(|i| &i.product_id != product_id);
            } else if let Some(item) = s.items.iter_mut().find(|i| &i.product_id == product_id) {
                item.qty = qty;
            }
        });
    }

    /// Remove a cart line.
    pub fn remove_item(&self, product_id: &ProductId) {
        self.tx.send_modify(|s| {
            s.items.retain(|i| &i.product_id != product_id);
        });
    }

    /// Transition `Unsynced -> Syncing` for the given epoch.
    ///
    /// Returns `false` (without mutating) if the epoch is stale, the session
    /// is no longer authenticated, or the state already left `Unsynced`.
    pub(crate) fn begin_sync(&self, epoch: SessionEpoch) -> bool {
        let mut applied = false;
        self.tx.send_modify(|s| {
            if s.epoch == epoch
                && s.is_authenticated()
                && s.cart_sync == CartSyncState::Unsynced
            {
                s.cart_sync = CartSyncState::Syncing;
                applied = true;
            }
        });
        applied
    }

    /// Apply a successful reconciliation: the server cart replaces local
    /// items wholesale.
    ///
    /// Returns `false` (without mutating) if the epoch is stale.
    pub(crate) fn apply_sync_success(&self, epoch: SessionEpoch, items: Vec<CartItem>) -> bool {
        let mut applied = false;
        self.tx.send_modify(|s| {
            if s.epoch == epoch {
                s.items = items;
                s.cart_sync = CartSyncState::Synced;
                applied = true;
            }
        });
        applied
    }

    /// Apply a failed reconciliation according to the error-class policy.
    ///
    /// Returns `false` (without mutating) if the epoch is stale.
    pub(crate) fn apply_sync_failure(&self, epoch: SessionEpoch, failure: SyncFailure) -> bool {
        let mut applied = false;
        self.tx.send_modify(|s| {
            if s.epoch == epoch {
                match failure {
                    SyncFailure::DiscardAndSettle => {
                        s.items.clear();
                        s.cart_sync = CartSyncState::Synced;
                    }
                    SyncFailure::DiscardAndRetry => {
                        s.items.clear();
                        s.cart_sync = CartSyncState::Unsynced;
                    }
                    SyncFailure::RetryLater => {
                        s.cart_sync = CartSyncState::Unsynced;
                    }
                }
                applied = true;
            }
        });
        applied
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use tradehub_core::{CurrencyCode, Price, VendorId};

    use super::*;

    fn identity(role: Role) -> Identity {
        Identity {
            id: UserId::new("usr_1"),
            role,
            email_verified: true,
            approved: true,
        }
    }

    fn item(product: &str) -> CartItem {
        CartItem {
            product_id: ProductId::new(product),
            vendor_id: VendorId::new("vnd_1"),
            title: "Bulk widgets".to_owned(),
            price_per_unit: Price::new(Decimal::new(500, 2), CurrencyCode::USD),
            qty: 10,
            min_order_qty: 10,
            image_url: None,
        }
    }

    #[test]
    fn test_bootstrap_session_is_anonymous() {
        let handle = SessionHandle::new();
        let s = handle.snapshot();
        assert!(s.user.is_none());
        assert!(s.access_token.is_none());
        assert_eq!(s.cart_sync, CartSyncState::Unsynced);
        assert!(s.items.is_empty());
    }

    #[test]
    fn test_login_bumps_epoch_and_keeps_local_items() {
        let handle = SessionHandle::new();
        handle.add_item(item("prd_1"));
        let before = handle.snapshot().epoch;

        handle.login(identity(Role::Customer), AccessToken::new("tok_1"));

        let s = handle.snapshot();
        assert!(s.is_authenticated());
        assert!(s.epoch > before);
        assert_eq!(s.cart_sync, CartSyncState::Unsynced);
        // pre-login items survive until reconciliation replaces them
        assert_eq!(s.items.len(), 1);
    }

    #[test]
    fn test_logout_resets_sync_state_and_clears_items() {
        let handle = SessionHandle::new();
        handle.login(identity(Role::Customer), AccessToken::new("tok_1"));
        let epoch = handle.snapshot().epoch;
        assert!(handle.begin_sync(epoch));
        assert!(handle.apply_sync_success(epoch, vec![item("prd_1")]));

        handle.logout();

        let s = handle.snapshot();
        assert!(s.user.is_none());
        assert_eq!(s.cart_sync, CartSyncState::Unsynced);
        assert!(s.items.is_empty());
        assert!(s.epoch > epoch);
    }

    #[test]
    fn test_refresh_token_preserves_epoch_and_sync_state() {
        let handle = SessionHandle::new();
        handle.login(identity(Role::Vendor), AccessToken::new("tok_1"));
        let epoch = handle.snapshot().epoch;
        assert!(handle.begin_sync(epoch));
        assert!(handle.apply_sync_success(epoch, Vec::new()));

        handle.refresh_token(AccessToken::new("tok_2"));

        let s = handle.snapshot();
        assert_eq!(s.epoch, epoch);
        assert_eq!(s.cart_sync, CartSyncState::Synced);
        assert_eq!(
            s.access_token.as_ref().map(AccessToken::expose),
            Some("tok_2")
        );
    }

    #[test]
    fn test_refresh_token_ignored_when_anonymous() {
        let handle = SessionHandle::new();
        handle.refresh_token(AccessToken::new("tok_1"));
        assert!(handle.snapshot().access_token.is_none());
    }

    #[test]
    fn test_stale_epoch_transitions_are_discarded() {
        let handle = SessionHandle::new();
        handle.login(identity(Role::Customer), AccessToken::new("tok_1"));
        let stale = handle.snapshot().epoch;
        assert!(handle.begin_sync(stale));

        handle.logout();

        // late arrivals from the pre-logout epoch must not repopulate state
        assert!(!handle.apply_sync_success(stale, vec![item("prd_1")]));
        assert!(!handle.apply_sync_failure(stale, SyncFailure::DiscardAndSettle));
        let s = handle.snapshot();
        assert_eq!(s.cart_sync, CartSyncState::Unsynced);
        assert!(s.items.is_empty());
    }

    #[test]
    fn test_begin_sync_requires_unsynced_state() {
        let handle = SessionHandle::new();
        handle.login(identity(Role::Customer), AccessToken::new("tok_1"));
        let epoch = handle.snapshot().epoch;
        assert!(handle.begin_sync(epoch));
        // second trigger for the same epoch is refused
        assert!(!handle.begin_sync(epoch));
    }

    #[test]
    fn test_add_item_merges_duplicate_lines() {
        let handle = SessionHandle::new();
        handle.add_item(item("prd_1"));
        handle.add_item(item("prd_1"));
        let s = handle.snapshot();
        assert_eq!(s.items.len(), 1);
        assert_eq!(s.items.first().map(|i| i.qty), Some(20));
    }

    #[test]
    fn test_update_qty_zero_removes_line() {
        let handle = SessionHandle::new();
        handle.add_item(item("prd_1"));
        handle.update_qty(&ProductId::new("prd_1"), 0);
        assert!(handle.snapshot().items.is_empty());
    }

    #[test]
    fn test_subscribe_observes_transitions() {
        let handle = SessionHandle::new();
        let mut rx = handle.subscribe();
        assert!(!rx.has_changed().unwrap_or(true));

        handle.login(identity(Role::Admin), AccessToken::new("tok_1"));
        assert!(rx.has_changed().unwrap_or(false));
        assert!(rx.borrow_and_update().is_authenticated());
    }
}
