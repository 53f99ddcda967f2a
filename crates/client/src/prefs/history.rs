//! Browse history.
//!
//! An ordered, most-recent-first record of viewed products, deduplicated
//! by slug (falling back to product ID) and capped at
//! [`HISTORY_CAPACITY`] entries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use tradehub_core::ProductId;

use crate::prefs::{DeviceStorage, StorageError};

const HISTORY_KEY: &str = "tradehub.browse_history";

/// Maximum number of retained history entries.
pub const HISTORY_CAPACITY: usize = 50;

/// A viewed-product record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewedProduct {
    /// The viewed product.
    pub product_id: ProductId,
    /// URL slug, when the product has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Product title for display.
    pub title: String,
    /// When the product was viewed.
    pub viewed_at: DateTime<Utc>,
}

impl ViewedProduct {
    /// De-duplication key: slug when present, product ID otherwise.
    fn dedup_key(&self) -> &str {
        self.slug.as_deref().unwrap_or_else(|| self.product_id.as_str())
    }
}

/// Device-scoped browse history.
pub struct BrowseHistory {
    storage: Arc<dyn DeviceStorage>,
}

impl BrowseHistory {
    /// Create a history over the given storage.
    #[must_use]
    pub const fn new(storage: Arc<dyn DeviceStorage>) -> Self {
        Self { storage }
    }

    /// Record a view.
    ///
    /// A record duplicating an existing entry (same slug, or same ID when
    /// slugs are absent) moves to the front rather than growing the
    /// collection; the oldest entries fall off past the cap.
    pub fn record(&self, entry: ViewedProduct) {
        let mut entries = self.load();
        entries.retain(|e| e.dedup_key() != entry.dedup_key());
        entries.insert(0, entry);
        entries.truncate(HISTORY_CAPACITY);
        self.persist(&entries);
    }

    /// All entries, most recent first.
    #[must_use]
    pub fn recent(&self) -> Vec<ViewedProduct> {
        self.load()
    }

    /// Forget all history.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(HISTORY_KEY) {
            warn!(error = %e, "failed to clear browse history");
        }
    }

    fn load(&self) -> Vec<ViewedProduct> {
        let raw = match self.storage.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(StorageError::Backend(reason)) => {
                warn!(%reason, "history storage unavailable, treating as empty");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "corrupt browse history, treating as empty");
            Vec::new()
        })
    }

    fn persist(&self, entries: &[ViewedProduct]) {
        let json = match serde_json::to_string(entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize browse history");
                return;
            }
        };
        if let Err(e) = self.storage.set(HISTORY_KEY, &json) {
            warn!(error = %e, "failed to persist browse history");
        }
    }
}
