// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection manager: owns the transport activation and its state machine.
//!
//! The transport retries on its own with a fixed delay; this type only
//! decides when to activate or deactivate it and tracks what the transport
//! reports back through [`TransportEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use murmur_core::{ConnectOptions, CredentialProvider, MurmurError, Transport, TransportEvent};

/// Lifecycle of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Activated, waiting for the first handshake or retrying after a drop.
    Connecting,
    Connected,
}

/// Reconnect and heartbeat policy handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub reconnect_delay: Duration,
    pub heartbeat_incoming: Duration,
    pub heartbeat_outgoing: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(5000),
            heartbeat_incoming: Duration::from_millis(4000),
            heartbeat_outgoing: Duration::from_millis(4000),
        }
    }
}

/// Owns the transport handle and the connection state machine.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    settings: ConnectionSettings,
    events_tx: mpsc::Sender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    /// Bumped on every completed handshake.
    epoch: AtomicU64,
}

impl ConnectionManager {
    /// Create a manager whose transport reports into `events_tx`.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        settings: ConnectionSettings,
        events_tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            credentials,
            settings,
            events_tx,
            state,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of handshakes completed so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Watch state transitions.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Wait until the handshake completes.
    pub async fn wait_until_connected(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| *s == ConnectionState::Connected).await;
    }

    /// Activate the transport.
    ///
    /// No-op while connecting or connected. Without a credential this logs a
    /// warning and returns `Ok(())`: being signed out is not an error.
    pub async fn connect(&self) -> Result<(), MurmurError> {
        let Some(token) = self.credentials.access_token() else {
            warn!(
                transport = self.transport.name(),
                "no access token available, not connecting"
            );
            return Ok(());
        };

        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                claimed = true;
            }
            claimed
        });
        if !claimed {
            debug!(state = ?self.state(), "connect ignored, already active");
            return Ok(());
        }

        let options = self.connect_options(&token);
        info!(
            transport = self.transport.name(),
            reconnect_delay_ms = options.reconnect_delay.as_millis() as u64,
            "activating realtime transport"
        );
        if let Err(e) = self
            .transport
            .activate(options, self.events_tx.clone())
            .await
        {
            self.state.send_replace(ConnectionState::Disconnected);
            warn!(error = %e, "transport activation failed");
            return Err(e);
        }
        Ok(())
    }

    /// Deactivate the transport. Safe to call when not connected.
    pub async fn disconnect(&self) -> Result<(), MurmurError> {
        let previous = self.state.send_replace(ConnectionState::Disconnected);
        if previous == ConnectionState::Disconnected {
            debug!("disconnect ignored, not active");
        } else {
            info!(transport = self.transport.name(), "deactivating realtime transport");
        }
        self.transport.deactivate().await
    }

    /// Fold a transport lifecycle event into the state machine.
    ///
    /// Returns `true` when a fresh handshake completed, i.e. when the caller
    /// must run a resubscription pass.
    pub fn on_transport_event(&self, event: &TransportEvent) -> bool {
        match event {
            TransportEvent::Connected => {
                let mut accepted = false;
                self.state.send_if_modified(|state| {
                    // A late handshake after `disconnect()` is ignored.
                    if *state == ConnectionState::Connecting {
                        accepted = true;
                    }
                    accepted
                });
                if accepted {
                    let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                    // Publish the new epoch before anyone can observe `Connected`.
                    self.state.send_replace(ConnectionState::Connected);
                    info!(epoch, "realtime transport connected");
                }
                accepted
            }
            TransportEvent::Disconnected { reason } => {
                let dropped = self.state.send_if_modified(|state| {
                    if *state == ConnectionState::Connected {
                        *state = ConnectionState::Connecting;
                        true
                    } else {
                        false
                    }
                });
                if dropped {
                    warn!(reason = %reason, "realtime transport lost, retrying");
                }
                false
            }
            TransportEvent::Frame { .. } | TransportEvent::Error { .. } => false,
        }
    }

    fn connect_options(&self, token: &str) -> ConnectOptions {
        ConnectOptions {
            headers: vec![("Authorization".to_string(), format!("Bearer {token}"))],
            reconnect_delay: self.settings.reconnect_delay,
            heartbeat_incoming: self.settings.heartbeat_incoming,
            heartbeat_outgoing: self.settings.heartbeat_outgoing,
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.transport.name())
            .field("state", &self.state())
            .field("epoch", &self.epoch())
            .finish()
    }
}
