// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end sync tests.
//!
//! `SyncHarness` assembles a started [`SyncClient`] on top of the mock
//! transport, history, and mutation endpoints, and offers helpers to drive
//! the inbound side (`deliver`) and wait for the event loop to settle.

use std::sync::Arc;
use std::time::Duration;

use murmur_cache::MessageCache;
use murmur_config::{CursorMode, MurmurConfig};
use murmur_core::types::{ConversationId, Message};
use murmur_core::{MurmurError, StaticCredentials};
use murmur_sync::{SyncClient, SyncSettings};

use crate::mock_history::MockHistoryApi;
use crate::mock_mutation::MockMutationApi;
use crate::mock_transport::MockTransport;

/// How long helpers wait for the event loop before giving up.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Builder for [`SyncHarness`].
pub struct SyncHarnessBuilder {
    config: MurmurConfig,
    token: Option<String>,
    history: MockHistoryApi,
    seeds: Vec<(ConversationId, i64)>,
    start: bool,
}

impl SyncHarnessBuilder {
    fn new() -> Self {
        let mut config = MurmurConfig::default();
        config.transport.reconnect_delay_ms = 10;
        Self {
            config,
            token: Some("test-token".to_string()),
            history: MockHistoryApi::new(),
            seeds: Vec::new(),
            start: true,
        }
    }

    /// Seed server-side history with `count` messages.
    pub fn with_history(mut self, conversation_id: i64, count: i64) -> Self {
        self.seeds.push((ConversationId(conversation_id), count));
        self
    }

    pub fn with_cursor(mut self, cursor: CursorMode, page_size: u32) -> Self {
        self.config.history.cursor = cursor;
        self.config.history.page_size = page_size;
        self
    }

    /// Make the history endpoint report `hasMore` on id-boundary pages.
    pub fn with_has_more(mut self) -> Self {
        self.history = self.history.with_has_more();
        self
    }

    pub fn optimistic(mut self) -> Self {
        self.config.send.optimistic = true;
        self
    }

    pub fn with_account(mut self, account_id: i64) -> Self {
        self.config.auth.account_id = Some(account_id);
        self
    }

    /// Start signed out.
    pub fn without_token(mut self) -> Self {
        self.token = None;
        self
    }

    /// Build without starting the client.
    pub fn unstarted(mut self) -> Self {
        self.start = false;
        self
    }

    pub async fn build(self) -> Result<SyncHarness, MurmurError> {
        for (conversation_id, count) in &self.seeds {
            self.history.seed(*conversation_id, *count).await;
        }

        let transport = Arc::new(MockTransport::new());
        let history = Arc::new(self.history);
        let mutations = Arc::new(MockMutationApi::new());
        let credentials = Arc::new(StaticCredentials::new(self.token));
        let settings = SyncSettings::from(&self.config);
        let cache = Arc::new(match settings.account_id {
            Some(account_id) => MessageCache::with_account(account_id),
            None => MessageCache::new(),
        });

        let client = SyncClient::builder(transport.clone(), history.clone(), credentials.clone())
            .mutations(mutations.clone())
            .cache(cache.clone())
            .settings(settings)
            .build();

        if self.start {
            client.start().await?;
        }

        Ok(SyncHarness {
            client,
            cache,
            transport,
            history,
            mutations,
            credentials,
        })
    }
}

/// A sync client wired to in-memory mocks.
pub struct SyncHarness {
    pub client: SyncClient,
    pub cache: Arc<MessageCache>,
    pub transport: Arc<MockTransport>,
    pub history: Arc<MockHistoryApi>,
    pub mutations: Arc<MockMutationApi>,
    pub credentials: Arc<StaticCredentials>,
}

impl SyncHarness {
    /// Create a new harness builder.
    pub fn builder() -> SyncHarnessBuilder {
        SyncHarnessBuilder::new()
    }

    /// Wait until the client reports a completed handshake.
    pub async fn connected(&self) -> Result<(), MurmurError> {
        self.client.wait_until_connected(SETTLE_TIMEOUT).await
    }

    /// Wait until the registry's active set equals its desired set.
    pub async fn converged(&self) -> Result<(), MurmurError> {
        let registry = self.client.registry().clone();
        self.wait_for(move || {
            let registry = registry.clone();
            async move { registry.active().await == registry.desired().await }
        })
        .await
    }

    /// Deliver a message as the broker would on its conversation topic.
    pub async fn deliver(&self, message: &Message) -> Result<(), MurmurError> {
        let body = serde_json_body(message)?;
        let topic = self
            .client
            .registry()
            .scheme()
            .topic(message.conversation_id);
        self.deliver_raw(&topic, body).await
    }

    /// Deliver a raw body on a topic and wait until the loop consumed it.
    pub async fn deliver_raw(&self, topic: &str, body: String) -> Result<(), MurmurError> {
        if !self.transport.push_frame(topic, body).await {
            return Err(MurmurError::Internal(format!("no subscription for {topic}")));
        }
        self.settle().await;
        Ok(())
    }

    /// Let the inbound loop drain what was emitted so far.
    pub async fn settle(&self) {
        // The loop runs on the same runtime; a few yields are enough for it
        // to pick up one queued event, a short sleep covers the rest.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    /// Poll `condition` until it holds or the settle timeout elapses.
    pub async fn wait_for<F, Fut>(&self, mut condition: F) -> Result<(), MurmurError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
        loop {
            if condition().await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(MurmurError::Internal("condition not reached in time".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Ids of a conversation's cached messages in render order.
    pub fn ids(&self, conversation_id: i64) -> Vec<i64> {
        self.cache
            .message_ids(ConversationId(conversation_id))
            .into_iter()
            .map(|id| id.0)
            .collect()
    }
}

fn serde_json_body(message: &Message) -> Result<String, MurmurError> {
    serde_json::to_string(message).map_err(|e| MurmurError::Internal(e.to_string()))
}
