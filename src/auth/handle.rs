// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::auth::traits::AuthProvider;
use crate::cart::models::Credential;

/// In-process credential holder backed by a watch channel
#[derive(Debug, Clone)]
pub struct AuthHandle {
    tx: Arc<watch::Sender<Option<Credential>>>,
}

impl AuthHandle {
    pub fn new(initial: Option<Credential>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn sign_in(&self, credential: Credential) {
        info!(user_id = %credential.user_id, "Credential set");
        self.tx.send_replace(Some(credential));
    }

    pub fn sign_out(&self) {
        info!("Credential cleared");
        self.tx.send_replace(None);
    }
}

impl Default for AuthHandle {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AuthProvider for AuthHandle {
    fn current(&self) -> Option<Credential> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.tx.subscribe()
    }
}
