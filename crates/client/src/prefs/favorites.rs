//! Favorite products.
//!
//! A device-scoped set of product IDs with a broadcast signal so multiple
//! live store instances (header badge, product grid, favorites page) stay
//! consistent without a shared in-memory owner.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use tradehub_core::ProductId;

use crate::prefs::{DeviceStorage, StorageError};

const FAVORITES_KEY: &str = "tradehub.favorites";
const SIGNAL_CAPACITY: usize = 32;

/// A favorites mutation, broadcast to every live store instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoritesEvent {
    /// The instance that performed the mutation; observers may skip their
    /// own writes.
    pub source: Uuid,
    /// The product whose membership changed.
    pub product_id: ProductId,
    /// Membership after the mutation.
    pub favorited: bool,
}

/// Create the shared favorites signal for one execution context.
///
/// Every [`FavoritesStore`] built from a clone of this sender observes
/// the others' mutations.
#[must_use]
pub fn favorites_channel() -> broadcast::Sender<FavoritesEvent> {
    broadcast::channel(SIGNAL_CAPACITY).0
}

/// Device-scoped favorites set.
pub struct FavoritesStore {
    storage: Arc<dyn DeviceStorage>,
    signal: broadcast::Sender<FavoritesEvent>,
    instance: Uuid,
}

impl FavoritesStore {
    /// Create a store instance over shared storage and signal.
    #[must_use]
    pub fn new(storage: Arc<dyn DeviceStorage>, signal: broadcast::Sender<FavoritesEvent>) -> Self {
        Self {
            storage,
            signal,
            instance: Uuid::new_v4(),
        }
    }

    /// This instance's identity, as carried in broadcast events.
    #[must_use]
    pub const fn instance_id(&self) -> Uuid {
        self.instance
    }

    /// Subscribe to mutations from all instances in this context.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FavoritesEvent> {
        self.signal.subscribe()
    }

    /// Toggle a product's membership. Returns the membership afterwards.
    ///
    /// Symmetric: toggling twice restores the original membership.
    /// Broadcasts one event per call.
    pub fn toggle(&self, product_id: &ProductId) -> bool {
        let mut favorites = self.load();
        let favorited = if favorites.contains(product_id) {
            favorites.retain(|p| p != product_id);
            false
        } else {
            favorites.push(product_id.clone());
            true
        };
        self.persist(&favorites);

        // no live receivers is fine; the send result is irrelevant
        let _ = self.signal.send(FavoritesEvent {
            source: self.instance,
            product_id: product_id.clone(),
            favorited,
        });

        favorited
    }

    /// Whether a product is currently a favorite.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.load().contains(product_id)
    }

    /// All favorites, in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<ProductId> {
        self.load()
    }

    fn load(&self) -> Vec<ProductId> {
        let raw = match self.storage.get(FAVORITES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(StorageError::Backend(reason)) => {
                warn!(%reason, "favorites storage unavailable, treating as empty");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "corrupt favorites data, treating as empty");
            Vec::new()
        })
    }

    fn persist(&self, favorites: &[ProductId]) {
        let json = match serde_json::to_string(favorites) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize favorites");
                return;
            }
        };
        if let Err(e) = self.storage.set(FAVORITES_KEY, &json) {
            warn!(error = %e, "failed to persist favorites");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::prefs::MemoryStorage;

    use super::*;

    fn store_pair() -> (FavoritesStore, FavoritesStore) {
        let storage: Arc<dyn DeviceStorage> = Arc::new(MemoryStorage::new());
        let signal = favorites_channel();
        (
            FavoritesStore::new(storage.clone(), signal.clone()),
            FavoritesStore::new(storage, signal),
        )
    }

    #[test]
    fn test_toggle_is_symmetric() {
        let (store, _) = store_pair();
        let product = ProductId::new("prd_1");

        assert!(store.toggle(&product));
        assert!(store.contains(&product));
        assert!(!store.toggle(&product));
        assert!(!store.contains(&product));
        assert!(store.all().is_empty());
    }

    #[tokio::test]
    async fn test_double_toggle_fires_two_events() {
        let (store, observer) = store_pair();
        let mut rx = observer.subscribe();
        let product = ProductId::new("prd_1");

        store.toggle(&product);
        store.toggle(&product);

        let first = rx.recv().await.expect("first event");
        let second = rx.recv().await.expect("second event");
        assert!(first.favorited);
        assert!(!second.favorited);
        assert_eq!(first.source, store.instance_id());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_instances_share_membership_through_storage() {
        let (a, b) = store_pair();
        let product = ProductId::new("prd_7");

        a.toggle(&product);
        assert!(b.contains(&product));
    }

    #[test]
    fn test_corrupt_data_degrades_to_empty() {
        let storage: Arc<dyn DeviceStorage> = Arc::new(MemoryStorage::new());
        storage
            .set(FAVORITES_KEY, "{definitely not json")
            .expect("seed corrupt data");
        let store = FavoritesStore::new(storage, favorites_channel());

        assert!(store.all().is_empty());
        // still writable after degrading
        assert!(store.toggle(&ProductId::new("prd_1")));
        assert_eq!(store.all().len(), 1);
    }

    struct FailingStorage;

    impl DeviceStorage for FailingStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Backend("quota exceeded".to_owned()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("quota exceeded".to_owned()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("quota exceeded".to_owned()))
        }
    }

    #[test]
    fn test_unavailable_storage_never_raises() {
        let store = FavoritesStore::new(Arc::new(FailingStorage), favorites_channel());
        assert!(store.all().is_empty());
        // toggle still reports the in-memory result and broadcasts
        assert!(store.toggle(&ProductId::new("prd_1")));
    }
}
