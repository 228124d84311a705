// SPDX-License-Identifier: GPL-3.0-only
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Coalesces bursts of triggers per key into a single delayed run.
#[derive(Default)]
pub struct DebouncedTrigger {
    pending: Mutex<HashMap<&'static str, JoinHandle<()>>>,
}

impl DebouncedTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<&'static str, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `task` after `delay`, replacing whatever was scheduled under `key`
    pub fn schedule<F>(&self, key: &'static str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        if let Some(previous) = self.pending().insert(key, handle) {
            if !previous.is_finished() {
                debug!(key, "Coalesced pending trigger");
            }
            previous.abort();
        }
    }

    /// Cancel the pending run for `key` and run `task` right away
    pub async fn flush_now<F, T>(&self, key: &'static str, task: F) -> T
    where
        F: Future<Output = T>,
    {
        self.cancel(key);
        task.await
    }

    pub fn cancel(&self, key: &'static str) {
        if let Some(handle) = self.pending().remove(key) {
            handle.abort();
        }
    }

    /// Abort every pending or running task, e.g. when the credential changes
    pub fn cancel_all(&self) {
        for (key, handle) in self.pending().drain() {
            if !handle.is_finished() {
                debug!(key, "Cancelled pending trigger");
            }
            handle.abort();
        }
    }

    pub fn is_pending(&self, key: &'static str) -> bool {
        self.pending().get(key).is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DebouncedTrigger {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
