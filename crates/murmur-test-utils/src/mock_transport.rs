// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock pub/sub transport for deterministic testing.
//!
//! `MockTransport` implements `Transport` in memory. Tests drive the link
//! lifecycle (`simulate_drop`, `simulate_reconnect`), inject frames on
//! subscribed topics, script per-topic subscribe failures, and inspect what
//! was published.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use murmur_core::{ConnectOptions, MurmurError, SubscriptionHandle, Transport, TransportEvent};

/// An in-memory transport.
///
/// Two modes:
/// - **auto** (`new`): `activate` completes the handshake immediately and
///   emits `Connected`
/// - **manual** (`manual`): `activate` only records the call; the test
///   emits `Connected` via [`MockTransport::simulate_reconnect`]
pub struct MockTransport {
    auto_connect: bool,
    connected: AtomicBool,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    activations: Mutex<Vec<ConnectOptions>>,
    deactivations: AtomicUsize,
    fail_activation: AtomicBool,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
    subscribe_calls: Mutex<Vec<String>>,
    failing_topics: Mutex<HashSet<String>>,
    published: Mutex<Vec<(String, String)>>,
    fail_publish: AtomicBool,
    next_id: AtomicU64,
}

impl MockTransport {
    /// A transport whose handshake succeeds as soon as it is activated.
    pub fn new() -> Self {
        Self::with_mode(true)
    }

    /// A transport that waits for the test to complete the handshake.
    pub fn manual() -> Self {
        Self::with_mode(false)
    }

    fn with_mode(auto_connect: bool) -> Self {
        Self {
            auto_connect,
            connected: AtomicBool::new(false),
            events: Mutex::new(None),
            activations: Mutex::new(Vec::new()),
            deactivations: AtomicUsize::new(0),
            fail_activation: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
            subscribe_calls: Mutex::new(Vec::new()),
            failing_topics: Mutex::new(HashSet::new()),
            published: Mutex::new(Vec::new()),
            fail_publish: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
        }
    }

    /// Options passed to every `activate` call so far.
    pub async fn activations(&self) -> Vec<ConnectOptions> {
        self.activations.lock().await.clone()
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    /// Make `activate` fail.
    pub fn fail_activation(&self, fail: bool) {
        self.fail_activation.store(fail, Ordering::SeqCst);
    }

    /// Make every subscribe to `topic` fail until cleared.
    pub async fn fail_subscribe(&self, topic: &str) {
        self.failing_topics.lock().await.insert(topic.to_string());
    }

    pub async fn clear_subscribe_failures(&self) {
        self.failing_topics.lock().await.clear();
    }

    /// Make every publish fail until cleared.
    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Every topic passed to `subscribe`, including failed attempts.
    pub async fn subscribe_calls(&self) -> Vec<String> {
        self.subscribe_calls.lock().await.clone()
    }

    /// Topics with a live subscription on the current link.
    pub async fn active_topics(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .await
            .iter()
            .map(|h| h.topic.clone())
            .collect()
    }

    /// `(destination, body)` of every successful publish.
    pub async fn published(&self) -> Vec<(String, String)> {
        self.published.lock().await.clone()
    }

    /// Emit an arbitrary event to the activated client.
    pub async fn emit(&self, event: TransportEvent) {
        let sender = self.events.lock().await.clone();
        if let Some(sender) = sender {
            // A client that already shut down is not an error here.
            let _ = sender.send(event).await;
        }
    }

    /// Drop the link: live subscriptions die and `Disconnected` is emitted.
    pub async fn simulate_drop(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        self.subscriptions.lock().await.clear();
        self.emit(TransportEvent::Disconnected {
            reason: reason.to_string(),
        })
        .await;
    }

    /// Complete a (re)connection handshake.
    pub async fn simulate_reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.emit(TransportEvent::Connected).await;
    }

    /// Deliver a frame on `topic` if something is subscribed to it.
    ///
    /// Returns `false` when no live subscription matches, mirroring a broker
    /// that drops messages for unknown subscriptions.
    pub async fn push_frame(&self, topic: &str, body: impl Into<String>) -> bool {
        let subscription_id = self
            .subscriptions
            .lock()
            .await
            .iter()
            .find(|h| h.topic == topic)
            .map(|h| h.id.clone());
        let Some(subscription_id) = subscription_id else {
            return false;
        };
        self.emit(TransportEvent::Frame {
            subscription_id,
            topic: topic.to_string(),
            body: body.into(),
        })
        .await;
        true
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    async fn activate(
        &self,
        options: ConnectOptions,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), MurmurError> {
        if self.fail_activation.load(Ordering::SeqCst) {
            return Err(MurmurError::transport("mock activation failure"));
        }
        self.activations.lock().await.push(options);
        *self.events.lock().await = Some(events);
        if self.auto_connect {
            self.simulate_reconnect().await;
        }
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), MurmurError> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.subscriptions.lock().await.clear();
        *self.events.lock().await = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, topic: &str) -> Result<SubscriptionHandle, MurmurError> {
        self.subscribe_calls.lock().await.push(topic.to_string());
        if !self.is_connected() {
            return Err(MurmurError::NotConnected);
        }
        if self.failing_topics.lock().await.contains(topic) {
            return Err(MurmurError::transport(format!("broker refused {topic}")));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = SubscriptionHandle {
            id: format!("sub-{id}"),
            topic: topic.to_string(),
        };
        self.subscriptions.lock().await.push(handle.clone());
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), MurmurError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let before = subscriptions.len();
        subscriptions.retain(|h| h.id != handle.id);
        if subscriptions.len() == before {
            return Err(MurmurError::transport(format!(
                "unknown subscription {}",
                handle.id
            )));
        }
        Ok(())
    }

    async fn publish(&self, destination: &str, body: String) -> Result<(), MurmurError> {
        if !self.is_connected() {
            return Err(MurmurError::NotConnected);
        }
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(MurmurError::transport("mock publish failure"));
        }
        self.published
            .lock()
            .await
            .push((destination.to_string(), body));
        Ok(())
    }
}
