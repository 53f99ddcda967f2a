//! Status enums for session and cart state.

use serde::{Deserialize, Serialize};

/// Cart synchronization status for the current session.
///
/// Tracks whether the locally held cart has been reconciled against the
/// server-held cart for the current session epoch. `Syncing` is transient:
/// it must resolve to `Synced` or revert to `Unsynced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CartSyncState {
    /// No reconciliation has succeeded for this session epoch.
    #[default]
    Unsynced,
    /// A reconciliation request is in flight.
    Syncing,
    /// The local cart mirrors the server cart for this session epoch.
    Synced,
}
