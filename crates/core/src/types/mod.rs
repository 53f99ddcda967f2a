//! Core type definitions.
//!
//! All types here are plain data: serializable, cloneable, and free of I/O.

mod cart;
mod id;
mod price;
mod role;
mod status;
mod token;

pub use cart::CartItem;
pub use id::{OrderId, ProductId, UserId, VendorId};
pub use price::{CurrencyCode, Price};
pub use role::Role;
pub use status::CartSyncState;
pub use token::AccessToken;
