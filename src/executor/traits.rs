// SPDX-License-Identifier: GPL-3.0-only
use crate::executor::error::NetworkError;

/// Receives the executor's verdict on whether the remote is reachable
pub trait ReachabilityObserver: Send + Sync {
    /// A request completed with a 2xx status
    fn remote_reachable(&self);

    /// A request exhausted its attempts
    fn remote_unreachable(&self, error: &NetworkError);
}
