// SPDX-License-Identifier: GPL-3.0-only
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMode {
    /// No credential; the cart lives only locally
    #[default]
    Guest,
    /// Credential present and the remote is believed reachable
    Online,
    /// Credential present but remote calls are failing and suppressed
    Offline,
}

impl std::fmt::Display for ConnectivityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectivityMode::Guest => "guest",
            ConnectivityMode::Online => "online",
            ConnectivityMode::Offline => "offline",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    CredentialSet,
    CredentialCleared,
    RemoteReachable,
    RemoteUnreachable,
    /// The reconnect timer's trial resync did not succeed
    ReconnectFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEffect {
    ScheduleReconnect,
    CancelReconnect,
    ResetCart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectivityMode,
    pub to: ConnectivityMode,
    pub effects: Vec<ConnectivityEffect>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Guest / Online / Offline state machine. Pure: effects are returned for
/// the caller to carry out.
#[derive(Debug, Default)]
pub struct ConnectivityMachine {
    mode: ConnectivityMode,
}

impl ConnectivityMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ConnectivityMode {
        self.mode
    }

    pub fn handle(&mut self, event: ConnectivityEvent) -> Transition {
        use ConnectivityEffect::*;
        use ConnectivityEvent::*;
        use ConnectivityMode::*;

        let from = self.mode;
        let (to, effects) = match (from, event) {
            (Offline, CredentialSet) => (Online, vec![CancelReconnect]),
            (_, CredentialSet) => (Online, vec![]),
            (Guest, CredentialCleared) => (Guest, vec![]),
            (_, CredentialCleared) => (Guest, vec![CancelReconnect, ResetCart]),
            (Offline, RemoteReachable) => (Online, vec![CancelReconnect]),
            (Online, RemoteUnreachable) => (Offline, vec![ScheduleReconnect]),
            (Offline, ReconnectFailed) => (Offline, vec![ScheduleReconnect]),
            (mode, _) => (mode, vec![]),
        };

        self.mode = to;
        Transition { from, to, effects }
    }
}
