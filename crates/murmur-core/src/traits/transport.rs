// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pub/sub transport capability (STOMP over WebSocket, or a mock).

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::MurmurError;

/// Parameters captured at connect time.
///
/// Headers are not refreshed for the lifetime of the activation; a rotated
/// credential needs a fresh activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Headers sent with the protocol-level connect handshake.
    pub headers: Vec<(String, String)>,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Longest silence tolerated from the server before the link is considered dead.
    pub heartbeat_incoming: Duration,
    /// Interval at which we emit heartbeats.
    pub heartbeat_outgoing: Duration,
}

impl ConnectOptions {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Handle for one live topic subscription. Only valid for the connection
/// it was issued on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: String,
    pub topic: String,
}

/// Lifecycle and data events emitted by an activated transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The protocol handshake completed (first connect or a reconnect).
    Connected,
    /// The link dropped. The transport keeps retrying until deactivated.
    Disconnected { reason: String },
    /// A frame arrived on a subscribed topic.
    Frame {
        subscription_id: String,
        topic: String,
        body: String,
    },
    /// A protocol-level error that did not necessarily close the link.
    Error { message: String },
}

/// A persistent pub/sub connection with built-in retry.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Human-readable transport name for logs.
    fn name(&self) -> &str;

    /// Start connecting, retrying with `options.reconnect_delay` until
    /// [`Transport::deactivate`] is called. Returns once the attempt is
    /// scheduled; the outcome arrives on `events`.
    async fn activate(
        &self,
        options: ConnectOptions,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), MurmurError>;

    /// Tear down the connection and stop retrying. Safe to call when inactive.
    async fn deactivate(&self) -> Result<(), MurmurError>;

    /// Whether the handshake has completed and the link is up.
    fn is_connected(&self) -> bool;

    /// Subscribe to a topic on the current connection.
    async fn subscribe(&self, topic: &str) -> Result<SubscriptionHandle, MurmurError>;

    /// Drop a subscription issued on the current connection.
    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), MurmurError>;

    /// Publish a body to a destination.
    async fn publish(&self, destination: &str, body: String) -> Result<(), MurmurError>;
}
