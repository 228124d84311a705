// SPDX-License-Identifier: GPL-3.0-only
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::connectivity::machine::{
    ConnectivityEffect, ConnectivityEvent, ConnectivityMachine, ConnectivityMode, Transition,
};
use crate::executor::{NetworkError, ReachabilityObserver};

/// Shared owner of the [`ConnectivityMachine`].
///
/// Publishes the current mode on a watch channel. Transitions caused by the
/// request executor forward their effects to the engine's driver.
pub struct Connectivity {
    machine: Mutex<ConnectivityMachine>,
    mode_tx: watch::Sender<ConnectivityMode>,
    effects_tx: mpsc::UnboundedSender<ConnectivityEffect>,
}

impl Connectivity {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ConnectivityEffect>) {
        let (mode_tx, _) = watch::channel(ConnectivityMode::Guest);
        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let connectivity = Arc::new(Self {
            machine: Mutex::new(ConnectivityMachine::new()),
            mode_tx,
            effects_tx,
        });
        (connectivity, effects_rx)
    }

    pub fn mode(&self) -> ConnectivityMode {
        *self.mode_tx.borrow()
    }

    pub fn is_offline(&self) -> bool {
        self.mode() == ConnectivityMode::Offline
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityMode> {
        self.mode_tx.subscribe()
    }

    /// Run one transition and publish the new mode. Effects are returned to
    /// the caller, not dispatched.
    pub fn apply(&self, event: ConnectivityEvent) -> Transition {
        let mut machine = self.machine.lock().unwrap_or_else(PoisonError::into_inner);
        let transition = machine.handle(event);
        if transition.changed() {
            info!(from = %transition.from, to = %transition.to, ?event, "Connectivity mode changed");
            self.mode_tx.send_replace(transition.to);
        }
        transition
    }

    /// Run one transition and hand its effects to the driver
    pub fn dispatch(&self, event: ConnectivityEvent) -> Transition {
        let transition = self.apply(event);
        for effect in &transition.effects {
            if self.effects_tx.send(*effect).is_err() {
                warn!(?effect, "Connectivity effect dropped, engine driver is gone");
            }
        }
        transition
    }
}

impl ReachabilityObserver for Connectivity {
    fn remote_reachable(&self) {
        self.dispatch(ConnectivityEvent::RemoteReachable);
    }

    fn remote_unreachable(&self, error: &NetworkError) {
        warn!(error = %error, "Remote cart unreachable");
        self.dispatch(ConnectivityEvent::RemoteUnreachable);
    }
}
