// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic subscription registry.
//!
//! Tracks which conversations the client *wants* to hear about (desired)
//! and which topic subscriptions exist on the current connection (active),
//! and reconverges the two after every reconnect.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use murmur_core::types::ConversationId;
use murmur_core::{MurmurError, SubscriptionHandle};

use crate::connection::ConnectionManager;

/// Maps conversation ids to broker topics and send destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    topic_prefix: String,
    send_prefix: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new("/topic/conversations/", "/app/chat/")
    }
}

impl TopicScheme {
    pub fn new(topic_prefix: impl Into<String>, send_prefix: impl Into<String>) -> Self {
        Self {
            topic_prefix: topic_prefix.into(),
            send_prefix: send_prefix.into(),
        }
    }

    /// Broadcast topic for a conversation, e.g. `/topic/conversations/42`.
    pub fn topic(&self, conversation_id: ConversationId) -> String {
        format!("{}{}", self.topic_prefix, conversation_id)
    }

    /// Publish destination for a conversation, e.g. `/app/chat/42`.
    pub fn destination(&self, conversation_id: ConversationId) -> String {
        format!("{}{}", self.send_prefix, conversation_id)
    }

    /// Recover the conversation id from a broadcast topic.
    pub fn conversation_for(&self, topic: &str) -> Option<ConversationId> {
        topic
            .strip_prefix(&self.topic_prefix)?
            .parse()
            .ok()
            .map(ConversationId)
    }
}

/// Outcome of one resubscription pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResubscribeReport {
    pub succeeded: Vec<ConversationId>,
    pub failed: Vec<(ConversationId, String)>,
}

impl ResubscribeReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
struct ActiveSubscription {
    handle: SubscriptionHandle,
    /// Connection epoch the handle was issued on.
    epoch: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    desired: BTreeSet<ConversationId>,
    active: HashMap<ConversationId, ActiveSubscription>,
}

/// Desired-versus-active subscription bookkeeping.
///
/// The lock is held across transport calls, which serializes subscribe,
/// unsubscribe, and resubscription passes.
pub struct SubscriptionRegistry {
    connection: Arc<ConnectionManager>,
    scheme: TopicScheme,
    state: Mutex<RegistryState>,
}

impl SubscriptionRegistry {
    pub fn new(connection: Arc<ConnectionManager>, scheme: TopicScheme) -> Self {
        Self {
            connection,
            scheme,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn scheme(&self) -> &TopicScheme {
        &self.scheme
    }

    /// Start listening to a conversation.
    ///
    /// While disconnected this only records the intent and kicks off a
    /// connect; the topic is subscribed during the next resubscription pass.
    /// A failed immediate subscribe leaves the id desired so the next pass
    /// retries it. Calling this again while connected also retries any
    /// desired id that has no live handle.
    pub async fn subscribe(&self, conversation_id: ConversationId) -> Result<(), MurmurError> {
        let mut state = self.state.lock().await;
        state.desired.insert(conversation_id);

        if !self.connection.is_connected() {
            drop(state);
            debug!(conversation_id = %conversation_id, "subscribe deferred until connected");
            return self.connection.connect().await;
        }

        let epoch = self.connection.epoch();
        if state
            .active
            .get(&conversation_id)
            .is_some_and(|active| active.epoch == epoch)
        {
            return Ok(());
        }

        let topic = self.scheme.topic(conversation_id);
        match self.connection.transport().subscribe(&topic).await {
            Ok(handle) => {
                debug!(conversation_id = %conversation_id, topic = %topic, "subscribed");
                state
                    .active
                    .insert(conversation_id, ActiveSubscription { handle, epoch });
                Ok(())
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "subscribe failed");
                Err(MurmurError::SubscriptionFailure {
                    conversation_id,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Stop listening to a conversation. Unknown ids are a no-op.
    pub async fn unsubscribe(&self, conversation_id: ConversationId) {
        let mut state = self.state.lock().await;
        state.desired.remove(&conversation_id);
        let Some(active) = state.active.remove(&conversation_id) else {
            return;
        };
        if let Err(e) = self.connection.transport().unsubscribe(&active.handle).await {
            // The handle is dead either way once the link drops.
            debug!(conversation_id = %conversation_id, error = %e, "transport unsubscribe failed");
        } else {
            debug!(conversation_id = %conversation_id, "unsubscribed");
        }
    }

    /// Reconverge active with desired after a (re)connection.
    ///
    /// Handles issued on an earlier connection are dropped and every desired
    /// id without a current handle is subscribed again. Per-id failures are
    /// logged and reported; they never abort the pass.
    pub async fn resubscribe_all(&self) -> ResubscribeReport {
        let mut state = self.state.lock().await;
        let epoch = self.connection.epoch();
        state.active.retain(|_, active| active.epoch == epoch);

        let pending: Vec<ConversationId> = state
            .desired
            .iter()
            .filter(|id| !state.active.contains_key(*id))
            .copied()
            .collect();

        let mut report = ResubscribeReport::default();
        for conversation_id in pending {
            let topic = self.scheme.topic(conversation_id);
            match self.connection.transport().subscribe(&topic).await {
                Ok(handle) => {
                    state
                        .active
                        .insert(conversation_id, ActiveSubscription { handle, epoch });
                    report.succeeded.push(conversation_id);
                }
                Err(e) => {
                    warn!(
                        conversation_id = %conversation_id,
                        error = %e,
                        "resubscribe failed; retried by the next pass or by subscribing again"
                    );
                    report.failed.push((conversation_id, e.to_string()));
                }
            }
        }

        info!(
            epoch,
            desired = state.desired.len(),
            resubscribed = report.succeeded.len(),
            failed = report.failed.len(),
            "resubscription pass complete"
        );
        report
    }

    /// Forget every active handle. Called when the link is torn down.
    pub async fn clear_active(&self) {
        let mut state = self.state.lock().await;
        if !state.active.is_empty() {
            debug!(count = state.active.len(), "clearing active subscriptions");
        }
        state.active.clear();
    }

    /// Snapshot of the desired set, in id order.
    pub async fn desired(&self) -> Vec<ConversationId> {
        self.state.lock().await.desired.iter().copied().collect()
    }

    /// Snapshot of the active set, in id order.
    pub async fn active(&self) -> Vec<ConversationId> {
        let state = self.state.lock().await;
        let mut ids: Vec<ConversationId> = state.active.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn is_active(&self, conversation_id: ConversationId) -> bool {
        self.state.lock().await.active.contains_key(&conversation_id)
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}
