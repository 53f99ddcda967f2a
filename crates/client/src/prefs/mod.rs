//! Local preference stores: favorites and browse history.
//!
//! Durable, device-scoped, server-independent. Both stores persist through
//! the [`DeviceStorage`] boundary and degrade to empty collections when
//! storage is unavailable or holds corrupt data - nothing here ever raises
//! to the caller.

mod favorites;
mod history;
mod storage;

pub use favorites::{FavoritesEvent, FavoritesStore, favorites_channel};
pub use history::{BrowseHistory, HISTORY_CAPACITY, ViewedProduct};
pub use storage::{DeviceStorage, MemoryStorage, NullStorage, StorageError};
