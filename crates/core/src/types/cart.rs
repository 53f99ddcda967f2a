//! Cart line items.
//!
//! The same shape is used for locally held items and for items returned by
//! the remote cart gateway; the JSON representation passes through
//! structurally.

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId, VendorId};

/// A single line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product being purchased.
    pub product_id: ProductId,
    /// Vendor selling the product.
    pub vendor_id: VendorId,
    /// Product title for display.
    pub title: String,
    /// Unit price.
    pub price_per_unit: Price,
    /// Ordered quantity. Always at least 1.
    pub qty: u32,
    /// Vendor-imposed minimum order quantity. Always at least 1.
    pub min_order_qty: u32,
    /// Optional product image for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartItem {
    /// Whether the quantity meets the vendor's minimum order requirement.
    ///
    /// Checkout-adjacent callers enforce this; cart reconciliation itself
    /// never mutates quantities.
    #[must_use]
    pub const fn satisfies_min_order(&self) -> bool {
        self.qty >= self.min_order_qty
    }

    /// Line total for this item.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price_per_unit.times(self.qty)
    }
}
