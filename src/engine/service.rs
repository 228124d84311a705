// SPDX-License-Identifier: GPL-3.0-only
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::AuthProvider;
use crate::cart::{CartError, CartItem, CartSnapshot, CartState, Credential, LocalCartStore, Product, Rollback, SeedProvider};
use crate::config::Config;
use crate::connectivity::{Connectivity, ConnectivityEffect, ConnectivityEvent, ConnectivityMode};
use crate::engine::notice::{CartNotice, CartOperation, SyncOutcome};
use crate::executor::{RequestExecutor, RetryPolicy};
use crate::sync::{DebouncedTrigger, GatewayError, HttpCartGateway, RemoteCartGateway};
use crate::transport::Transport;

const RESYNC_KEY: &str = "resync";
const RECONNECT_KEY: &str = "reconnect";
const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub retry: RetryPolicy,
    pub reconnect_interval: Duration,
    pub resync_debounce: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::from_config(config),
            reconnect_interval: Duration::from_secs(config.reconnect_interval_secs),
            resync_debounce: Duration::from_millis(config.resync_debounce_ms),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Default)]
struct Session {
    credential: Option<Credential>,
    /// Bumped on every credential change; work tagged with an older epoch is stale
    epoch: u64,
}

struct RemoteTarget {
    cart_id: String,
    credential: Credential,
    epoch: u64,
}

struct EngineInner {
    settings: EngineSettings,
    gateway: Arc<dyn RemoteCartGateway>,
    connectivity: Arc<Connectivity>,
    seed: Arc<dyn SeedProvider>,
    /// Serialization point for every cart mutation, foreground or background
    store: tokio::sync::Mutex<LocalCartStore>,
    session: Mutex<Session>,
    debounce: DebouncedTrigger,
    state_tx: watch::Sender<CartState>,
    notices: broadcast::Sender<CartNotice>,
    loading: AtomicUsize,
    reconnect_tx: mpsc::UnboundedSender<u64>,
}

/// Keeps the local cart consistent with the remote one.
///
/// Every operation applies to the local cart first and is then attempted
/// remotely while online. Remote state replaces local state wholesale on each
/// successful resync.
pub struct CartEngine {
    inner: Arc<EngineInner>,
    driver: JoinHandle<()>,
}

impl CartEngine {
    /// Build the engine and spawn its driver task. Must be called from
    /// within a tokio runtime.
    pub fn start(
        settings: EngineSettings,
        transport: Arc<dyn Transport>,
        auth: &dyn AuthProvider,
        seed: Arc<dyn SeedProvider>,
    ) -> Self {
        let (connectivity, effects_rx) = Connectivity::new();
        let executor = RequestExecutor::new(transport, settings.retry).with_observer(connectivity.clone());
        let gateway: Arc<dyn RemoteCartGateway> = Arc::new(HttpCartGateway::new(executor));

        let store = LocalCartStore::new(CartSnapshot::new(None, seed.seed_items()));
        let (state_tx, _) = watch::channel(CartState {
            items: store.snapshot().items,
            ..CartState::default()
        });
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(EngineInner {
            settings,
            gateway,
            connectivity,
            seed,
            store: tokio::sync::Mutex::new(store),
            session: Mutex::new(Session::default()),
            debounce: DebouncedTrigger::new(),
            state_tx,
            notices,
            loading: AtomicUsize::new(0),
            reconnect_tx,
        });

        let mut auth_rx = auth.subscribe();
        let initial = auth_rx.borrow_and_update().clone();
        if let Some(epoch) = inner.open_session(initial) {
            inner.connectivity.apply(ConnectivityEvent::CredentialSet);
            inner.schedule_resync(epoch, settings.resync_debounce, false);
        }

        let mode_rx = inner.connectivity.subscribe();
        let driver = tokio::spawn(drive(Arc::clone(&inner), auth_rx, effects_rx, reconnect_rx, mode_rx));

        info!(mode = %inner.connectivity.mode(), "Cart engine started");
        Self { inner, driver }
    }

    /// Add `quantity` units of `product`, merging with an existing line
    pub async fn add_item(&self, product: Product, quantity: u32) -> Result<SyncOutcome, CartError> {
        let inner = &self.inner;
        let (product_key, rollback, target) = {
            let mut store = inner.store.lock().await;
            let (line, rollback) = store.add(product, quantity)?;
            inner.publish(&store, false);
            (line.product_key, rollback, inner.remote_target(&store))
        };

        let Some(target) = target else {
            return Ok(SyncOutcome::Local);
        };
        let result = inner
            .gateway
            .create_item(&target.cart_id, &target.credential, &product_key, quantity)
            .await;
        inner.settle(CartOperation::Add, &product_key, &target, result, Some(rollback)).await
    }

    /// Set a line's quantity. Non-positive values are rejected; use
    /// [`CartEngine::remove_item`] instead.
    pub async fn update_quantity(&self, product_key: &str, quantity: i64) -> Result<SyncOutcome, CartError> {
        let inner = &self.inner;
        let (rollback, new_quantity, target) = {
            let mut store = inner.store.lock().await;
            let rollback = store.update_quantity(product_key, quantity)?;
            let new_quantity = store.snapshot().get(product_key).map_or(0, |item| item.quantity);
            inner.publish(&store, false);
            (rollback, new_quantity, inner.remote_target(&store))
        };

        let Some(target) = target else {
            return Ok(SyncOutcome::Local);
        };
        let result = inner
            .gateway
            .update_item_quantity(&target.cart_id, &target.credential, product_key, new_quantity)
            .await;
        inner.settle(CartOperation::UpdateQuantity, product_key, &target, result, Some(rollback)).await
    }

    /// Remove a line. A failed remote delete does not bring the line back.
    pub async fn remove_item(&self, product_key: &str) -> Result<SyncOutcome, CartError> {
        let inner = &self.inner;
        let (removed, target) = {
            let mut store = inner.store.lock().await;
            let removed = store.remove(product_key)?;
            if removed.is_some() {
                inner.publish(&store, false);
            }
            (removed, inner.remote_target(&store))
        };

        if removed.is_none() {
            debug!(product_key = %product_key, "Remove ignored, product not in cart");
            return Ok(SyncOutcome::Local);
        }
        let Some(target) = target else {
            return Ok(SyncOutcome::Local);
        };
        let result = inner.gateway.delete_item(&target.cart_id, &target.credential, product_key).await;
        inner.settle(CartOperation::Remove, product_key, &target, result, None).await
    }

    /// Empty the cart locally. The remote cart has no bulk clear, so a
    /// signed-in user's remote lines come back on the next resync.
    pub async fn clear(&self) -> SyncOutcome {
        let inner = &self.inner;
        {
            let mut store = inner.store.lock().await;
            store.clear();
            inner.publish(&store, false);
        }

        if inner.connectivity.mode() != ConnectivityMode::Guest {
            warn!(
                cart_id = ?inner.state_tx.borrow().cart_id,
                "Remote bulk clear is not implemented, cart cleared locally only"
            );
            inner.notify(CartNotice::RemoteOpUnsupported {
                operation: CartOperation::Clear,
            });
        }
        SyncOutcome::Local
    }

    /// Replace the local cart with the remote one now, cancelling any
    /// pending background resync. Also attempted while offline.
    pub async fn resync(&self) -> Result<SyncOutcome, CartError> {
        let inner = &self.inner;
        let epoch = inner.session().epoch;
        inner.debounce.flush_now(RESYNC_KEY, inner.resync_for(epoch, true)).await
    }

    pub fn items(&self) -> Arc<[CartItem]> {
        self.inner.state_tx.borrow().items.clone()
    }

    pub fn state(&self) -> CartState {
        let mut state = self.inner.state_tx.borrow().clone();
        state.is_offline = self.inner.connectivity.is_offline();
        state.is_loading = self.is_loading();
        state
    }

    /// Change notifications for the read-only projection
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state_tx.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<CartNotice> {
        self.inner.notices.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst) > 0
    }

    pub fn is_offline(&self) -> bool {
        self.inner.connectivity.is_offline()
    }

    pub fn mode(&self) -> ConnectivityMode {
        self.inner.connectivity.mode()
    }

    /// Current version of the cart as last published
    pub fn snapshot(&self) -> CartSnapshot {
        let state = self.inner.state_tx.borrow();
        CartSnapshot {
            cart_id: state.cart_id.clone(),
            items: state.items.clone(),
        }
    }

    pub fn total(&self) -> f64 {
        self.snapshot().total()
    }

    /// Number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.snapshot().item_count()
    }

    pub fn quantity_of(&self, product_key: &str) -> Option<u32> {
        self.snapshot().get(product_key).map(|item| item.quantity)
    }
}

impl Drop for CartEngine {
    fn drop(&mut self) {
        self.driver.abort();
        self.inner.debounce.cancel_all();
    }
}

impl EngineInner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.session().epoch == epoch
    }

    fn credential_for(&self, epoch: u64) -> Option<Credential> {
        let session = self.session();
        if session.epoch != epoch {
            return None;
        }
        session.credential.clone()
    }

    fn notify(&self, notice: CartNotice) {
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }

    /// Push the store's current version to subscribers
    fn publish(&self, store: &LocalCartStore, synced: bool) {
        let snapshot = store.snapshot();
        let is_offline = self.connectivity.is_offline();
        self.state_tx.send_modify(|state| {
            state.cart_id = snapshot.cart_id;
            state.items = snapshot.items;
            state.is_offline = is_offline;
            if synced {
                state.last_synced_at = Some(Utc::now());
            }
        });
    }

    fn publish_loading(&self) {
        let is_loading = self.loading.load(Ordering::SeqCst) > 0;
        self.state_tx.send_if_modified(|state| {
            let changed = state.is_loading != is_loading;
            state.is_loading = is_loading;
            changed
        });
    }

    fn publish_mode(&self, mode: ConnectivityMode) {
        let is_offline = mode == ConnectivityMode::Offline;
        self.state_tx.send_if_modified(|state| {
            let changed = state.is_offline != is_offline;
            state.is_offline = is_offline;
            changed
        });
    }

    /// Where a local change should be mirrored, if anywhere
    fn remote_target(&self, store: &LocalCartStore) -> Option<RemoteTarget> {
        if self.connectivity.mode() != ConnectivityMode::Online {
            return None;
        }
        let session = self.session();
        let credential = session.credential.clone()?;
        let Some(cart_id) = store.cart_id() else {
            debug!(user_id = %credential.user_id, "No remote cart yet, change kept locally");
            return None;
        };
        Some(RemoteTarget {
            cart_id: cart_id.to_string(),
            credential,
            epoch: session.epoch,
        })
    }

    /// Interpret the remote result of a local change.
    ///
    /// Network failures keep the local change. A rejection reverts it when a
    /// rollback is given and is returned to the caller.
    async fn settle(
        &self,
        operation: CartOperation,
        product_key: &str,
        target: &RemoteTarget,
        result: Result<(), GatewayError>,
        rollback: Option<Rollback>,
    ) -> Result<SyncOutcome, CartError> {
        match result {
            Ok(()) => {
                // RESYNC_KEY now belongs to the new credential's session.
                if !self.is_current(target.epoch) {
                    debug!(%operation, product_key = %product_key, "Change confirmed for a previous credential");
                    return Ok(SyncOutcome::Synced);
                }
                let _ = self
                    .debounce
                    .flush_now(RESYNC_KEY, self.resync_for(target.epoch, false))
                    .await;
                Ok(SyncOutcome::Synced)
            }
            Err(GatewayError::Rejected { status, message }) => {
                warn!(%operation, product_key = %product_key, status, message = %message, "Remote cart rejected change");
                if let Some(rollback) = rollback {
                    let mut store = self.store.lock().await;
                    if self.is_current(target.epoch) && store.revert(rollback) {
                        self.publish(&store, false);
                    }
                }
                self.notify(CartNotice::RemoteRejected {
                    operation,
                    status,
                    message: message.clone(),
                });
                Err(CartError::RemoteRejected { status, message })
            }
            Err(GatewayError::InvalidRequest(message)) => Err(CartError::Validation(message)),
            Err(error) => {
                warn!(%operation, product_key = %product_key, error = %error, "Remote cart update failed, keeping local change");
                self.notify(CartNotice::SyncDeferred {
                    operation,
                    product_key: Some(product_key.to_string()),
                    reason: error.to_string(),
                });
                Ok(SyncOutcome::Deferred)
            }
        }
    }

    async fn fetch_remote(&self, credential: &Credential) -> Result<CartSnapshot, GatewayError> {
        let carts = self.gateway.list_carts(credential).await?;
        let Some(cart) = carts.first() else {
            info!(user_id = %credential.user_id, "User has no remote cart yet");
            return Ok(CartSnapshot::default());
        };
        let items = self.gateway.list_items(&cart.id, credential).await?;
        Ok(CartSnapshot::new(Some(cart.id.clone()), items))
    }

    /// Fetch the remote cart and replace the store with it.
    ///
    /// `foreground` resyncs surface failures as notices; background ones only log.
    async fn resync_for(&self, epoch: u64, foreground: bool) -> Result<SyncOutcome, CartError> {
        let Some(credential) = self.credential_for(epoch) else {
            return Ok(SyncOutcome::Local);
        };

        let _loading = LoadingGuard::new(self);
        let snapshot = match self.fetch_remote(&credential).await {
            Ok(snapshot) => snapshot,
            Err(GatewayError::Rejected { status, message }) => {
                warn!(status, message = %message, "Remote cart rejected resync");
                if foreground {
                    self.notify(CartNotice::RemoteRejected {
                        operation: CartOperation::Resync,
                        status,
                        message: message.clone(),
                    });
                }
                return Err(CartError::RemoteRejected { status, message });
            }
            Err(error) => {
                warn!(error = %error, foreground, "Resync failed, keeping local cart");
                if foreground {
                    self.notify(CartNotice::SyncDeferred {
                        operation: CartOperation::Resync,
                        product_key: None,
                        reason: error.to_string(),
                    });
                }
                return Ok(SyncOutcome::Deferred);
            }
        };

        let mut store = self.store.lock().await;
        if !self.is_current(epoch) {
            debug!(epoch, "Discarding resync result for a previous credential");
            return Ok(SyncOutcome::Local);
        }
        store.replace(snapshot);
        self.publish(&store, true);
        info!(cart_id = ?store.cart_id(), count = store.snapshot().items.len(), "Cart reconciled with remote");
        Ok(SyncOutcome::Synced)
    }

    async fn background_resync(&self, epoch: u64, trial: bool) {
        let outcome = self.resync_for(epoch, false).await;
        if !trial || !self.is_current(epoch) {
            return;
        }
        if !matches!(outcome, Ok(SyncOutcome::Synced)) {
            debug!(epoch, "Reconnect attempt failed");
            self.connectivity.dispatch(ConnectivityEvent::ReconnectFailed);
        }
    }

    fn schedule_resync(self: &Arc<Self>, epoch: u64, delay: Duration, trial: bool) {
        let inner = Arc::clone(self);
        self.debounce.schedule(RESYNC_KEY, delay, async move {
            inner.background_resync(epoch, trial).await;
        });
    }

    /// Swap the session credential. Returns the new epoch, or `None` when
    /// nothing changed.
    fn open_session(&self, credential: Option<Credential>) -> Option<u64> {
        let epoch = {
            let mut session = self.session();
            if session.credential == credential {
                return None;
            }
            let user_id = credential.as_ref().map(|c| c.user_id.clone());
            session.credential = credential;
            session.epoch += 1;
            info!(epoch = session.epoch, user_id = ?user_id, "Starting cart session");
            session.epoch
        };
        // Timers and in-flight resyncs belong to the old credential.
        self.debounce.cancel_all();
        Some(epoch)
    }

    async fn change_credential(self: &Arc<Self>, credential: Option<Credential>) {
        let signed_in = credential.is_some();
        let Some(epoch) = self.open_session(credential) else {
            return;
        };

        let event = if signed_in {
            ConnectivityEvent::CredentialSet
        } else {
            ConnectivityEvent::CredentialCleared
        };
        let transition = self.connectivity.apply(event);
        for effect in transition.effects {
            self.handle_effect(effect).await;
        }

        if signed_in {
            self.reset_to_seed().await;
            self.schedule_resync(epoch, self.settings.resync_debounce, false);
        }
    }

    async fn reset_to_seed(&self) {
        let mut store = self.store.lock().await;
        store.replace(CartSnapshot::new(None, self.seed.seed_items()));
        self.state_tx.send_modify(|state| state.last_synced_at = None);
        self.publish(&store, false);
        debug!("Cart reset to seed items");
    }

    async fn handle_effect(self: &Arc<Self>, effect: ConnectivityEffect) {
        match effect {
            ConnectivityEffect::ScheduleReconnect => {
                let epoch = self.session().epoch;
                let reconnect_tx = self.reconnect_tx.clone();
                info!(interval = ?self.settings.reconnect_interval, "Scheduling reconnect attempt");
                self.debounce.schedule(RECONNECT_KEY, self.settings.reconnect_interval, async move {
                    let _ = reconnect_tx.send(epoch);
                });
            }
            ConnectivityEffect::CancelReconnect => self.debounce.cancel(RECONNECT_KEY),
            ConnectivityEffect::ResetCart => self.reset_to_seed().await,
        }
    }

    fn reconnect_due(self: &Arc<Self>, epoch: u64) {
        if !self.is_current(epoch) || self.connectivity.mode() != ConnectivityMode::Offline {
            return;
        }
        info!(epoch, "Attempting reconnect");
        self.schedule_resync(epoch, Duration::ZERO, true);
    }
}

struct LoadingGuard<'a> {
    inner: &'a EngineInner,
}

impl<'a> LoadingGuard<'a> {
    fn new(inner: &'a EngineInner) -> Self {
        inner.loading.fetch_add(1, Ordering::SeqCst);
        inner.publish_loading();
        Self { inner }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.inner.loading.fetch_sub(1, Ordering::SeqCst);
        self.inner.publish_loading();
    }
}

/// Serializes background work: credential changes, connectivity effects and
/// reconnect timers.
async fn drive(
    inner: Arc<EngineInner>,
    mut auth_rx: watch::Receiver<Option<Credential>>,
    mut effects_rx: mpsc::UnboundedReceiver<ConnectivityEffect>,
    mut reconnect_rx: mpsc::UnboundedReceiver<u64>,
    mut mode_rx: watch::Receiver<ConnectivityMode>,
) {
    let mut auth_open = true;
    let mut last_mode = *mode_rx.borrow_and_update();

    loop {
        tokio::select! {
            changed = auth_rx.changed(), if auth_open => {
                if changed.is_err() {
                    warn!("Auth provider dropped, keeping the last credential");
                    auth_open = false;
                    continue;
                }
                let credential = auth_rx.borrow_and_update().clone();
                inner.change_credential(credential).await;
            }
            Some(effect) = effects_rx.recv() => inner.handle_effect(effect).await,
            Some(epoch) = reconnect_rx.recv() => inner.reconnect_due(epoch),
            changed = mode_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let mode = *mode_rx.borrow_and_update();
                if mode != last_mode {
                    inner.notify(CartNotice::ModeChanged { from: last_mode, to: mode });
                    last_mode = mode;
                }
                inner.publish_mode(mode);
            }
            else => break,
        }
    }
    debug!("Cart engine driver stopped");
}
