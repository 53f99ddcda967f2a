//! TradeHub Client - session, cart synchronization, and access gating.
//!
//! This crate is the stateful core of the TradeHub marketplace client. Page
//! rendering, routing, and REST handlers live elsewhere; what lives here is
//! everything with real state-machine and consistency concerns:
//!
//! - [`session`] - the single source of truth for the authenticated identity,
//!   access credential, cart items, and cart synchronization status
//! - [`sync`] - reconciles the local cart against the server-held cart
//!   exactly once per session epoch
//! - [`gate`] - admission control for role-restricted screens
//! - [`prefs`] - durable, device-scoped favorites and browse history
//! - [`gateway`] - reqwest-backed wrappers around the TradeHub backend
//!
//! # Architecture
//!
//! All shared state funnels through [`session::SessionHandle`], a narrow
//! mutation API over a watch channel. Components never mutate each other's
//! derived state: the gate only reads the session, the synchronizer owns the
//! sync transitions, and the preference stores touch nothing but device
//! storage.
//!
//! # Example
//!
//! ```rust,ignore
//! use tradehub_client::ClientState;
//! use tradehub_client::config::ClientConfig;
//!
//! let state = ClientState::new(ClientConfig::from_env()?);
//! state.spawn_cart_sync();
//!
//! state.sign_in("buyer@example.com", "hunter2").await?;
//! // the background watcher reconciles the cart once the login lands
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod gate;
pub mod gateway;
pub mod prefs;
pub mod session;
pub mod state;
pub mod sync;

pub use state::ClientState;
