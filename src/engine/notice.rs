// SPDX-License-Identifier: GPL-3.0-only
use crate::connectivity::ConnectivityMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOperation {
    Add,
    UpdateQuantity,
    Remove,
    Clear,
    Resync,
}

impl std::fmt::Display for CartOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CartOperation::Add => "add",
            CartOperation::UpdateQuantity => "update_quantity",
            CartOperation::Remove => "remove",
            CartOperation::Clear => "clear",
            CartOperation::Resync => "resync",
        };
        f.write_str(name)
    }
}

/// Where a change ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Applied to the local cart only (guest, offline, or no remote cart yet)
    Local,
    /// Confirmed by the remote cart
    Synced,
    /// Applied locally; the remote attempt failed and the next resync reconciles
    Deferred,
}

/// Non-blocking notices for the UI
#[derive(Debug, Clone, PartialEq)]
pub enum CartNotice {
    SyncDeferred {
        operation: CartOperation,
        product_key: Option<String>,
        reason: String,
    },
    RemoteRejected {
        operation: CartOperation,
        status: u16,
        message: String,
    },
    RemoteOpUnsupported {
        operation: CartOperation,
    },
    ModeChanged {
        from: ConnectivityMode,
        to: ConnectivityMode,
    },
}
