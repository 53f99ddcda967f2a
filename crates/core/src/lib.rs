//! TradeHub Core - Shared types library.
//!
//! This crate provides common types used across all TradeHub client components:
//! - `client` - Session state, cart synchronization, and access gating
//! - `integration-tests` - Cross-component test harness
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, roles, prices, cart
//!   items, credentials, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
