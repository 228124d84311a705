// SPDX-License-Identifier: GPL-3.0-only
use tokio::sync::watch;

use crate::cart::models::Credential;

/// Source of the current credential. The engine only reads it.
pub trait AuthProvider: Send + Sync {
    /// Credential in effect right now
    fn current(&self) -> Option<Credential>;

    /// Change notifications, including sign-out (`None`)
    fn subscribe(&self) -> watch::Receiver<Option<Credential>>;
}
