// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client facade and inbound event loop.
//!
//! [`SyncClient`] wires the connection manager, subscription registry,
//! pagination coordinator, send pipeline, and message cache together with
//! explicit handles. One background task consumes [`TransportEvent`]s until
//! the client is shut down; frame and transport errors are logged and never
//! end the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use murmur_cache::MessageCache;
use murmur_config::{CursorMode, MurmurConfig};
use murmur_core::types::{ContentType, ConversationId, MessageId, MessagePatch};
use murmur_core::{CredentialProvider, HistoryApi, MurmurError, MutationApi, Transport, TransportEvent};

use crate::actions::MessageActions;
use crate::connection::{ConnectionManager, ConnectionSettings, ConnectionState};
use crate::frame::{self, InboundEvent};
use crate::pagination::{PageOutcome, PaginationCoordinator, strategy_for};
use crate::registry::{SubscriptionRegistry, TopicScheme};
use crate::send::{SendPipeline, SendReceipt};

/// Tunables of a [`SyncClient`], usually derived from [`MurmurConfig`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub connection: ConnectionSettings,
    pub scheme: TopicScheme,
    pub cursor: CursorMode,
    pub page_size: u32,
    pub optimistic: bool,
    pub event_buffer: usize,
    pub account_id: Option<i64>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&MurmurConfig::default())
    }
}

impl From<&MurmurConfig> for SyncSettings {
    fn from(config: &MurmurConfig) -> Self {
        Self {
            connection: ConnectionSettings {
                reconnect_delay: config.transport.reconnect_delay(),
                heartbeat_incoming: config.transport.heartbeat_incoming(),
                heartbeat_outgoing: config.transport.heartbeat_outgoing(),
            },
            scheme: TopicScheme::new(
                config.transport.topic_prefix.clone(),
                config.transport.send_prefix.clone(),
            ),
            cursor: config.history.cursor,
            page_size: config.history.page_size,
            optimistic: config.send.optimistic,
            event_buffer: config.transport.event_buffer,
            account_id: config.auth.account_id,
        }
    }
}

/// Assembles a [`SyncClient`].
pub struct SyncClientBuilder {
    transport: Arc<dyn Transport>,
    history: Arc<dyn HistoryApi>,
    credentials: Arc<dyn CredentialProvider>,
    mutations: Option<Arc<dyn MutationApi>>,
    cache: Option<Arc<MessageCache>>,
    settings: SyncSettings,
}

impl SyncClientBuilder {
    /// Supply the REST mutation endpoints, enabling [`SyncClient::actions`].
    pub fn mutations(mut self, api: Arc<dyn MutationApi>) -> Self {
        self.mutations = Some(api);
        self
    }

    /// Share an existing cache instead of creating one.
    pub fn cache(mut self, cache: Arc<MessageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn config(self, config: &MurmurConfig) -> Self {
        self.settings(SyncSettings::from(config))
    }

    pub fn build(self) -> SyncClient {
        let settings = self.settings;
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(match settings.account_id {
                Some(account_id) => MessageCache::with_account(account_id),
                None => MessageCache::new(),
            })
        });

        let (events_tx, events_rx) = mpsc::channel(settings.event_buffer.max(1));
        let connection = Arc::new(ConnectionManager::new(
            self.transport,
            self.credentials,
            settings.connection,
            events_tx,
        ));
        let registry = Arc::new(SubscriptionRegistry::new(
            connection.clone(),
            settings.scheme.clone(),
        ));
        let pagination = PaginationCoordinator::new(
            self.history,
            cache.clone(),
            strategy_for(settings.cursor, settings.page_size),
        );
        let sender = SendPipeline::new(
            connection.clone(),
            cache.clone(),
            settings.scheme.clone(),
            settings.optimistic,
        );
        let actions = self
            .mutations
            .map(|api| MessageActions::new(api, cache.clone(), settings.account_id));

        SyncClient {
            cache,
            connection,
            registry,
            pagination,
            sender,
            actions,
            events_rx: Mutex::new(Some(events_rx)),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }
}

/// The realtime sync core, assembled.
pub struct SyncClient {
    cache: Arc<MessageCache>,
    connection: Arc<ConnectionManager>,
    registry: Arc<SubscriptionRegistry>,
    pagination: PaginationCoordinator,
    sender: SendPipeline,
    actions: Option<MessageActions>,
    events_rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncClient {
    pub fn builder(
        transport: Arc<dyn Transport>,
        history: Arc<dyn HistoryApi>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> SyncClientBuilder {
        SyncClientBuilder {
            transport,
            history,
            credentials,
            mutations: None,
            cache: None,
            settings: SyncSettings::default(),
        }
    }

    pub fn cache(&self) -> &Arc<MessageCache> {
        &self.cache
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn pagination(&self) -> &PaginationCoordinator {
        &self.pagination
    }

    /// Edit/delete/reaction actions, when a mutation API was supplied.
    pub fn actions(&self) -> Option<&MessageActions> {
        self.actions.as_ref()
    }

    /// Spawn the inbound event loop and connect.
    ///
    /// Calling `start` twice is an error; the event receiver is consumed by
    /// the first call.
    pub async fn start(&self) -> Result<(), MurmurError> {
        let Some(events) = self.events_rx.lock().await.take() else {
            return Err(MurmurError::Internal("sync client already started".to_string()));
        };

        let inbound = InboundLoop {
            cache: self.cache.clone(),
            connection: self.connection.clone(),
            registry: self.registry.clone(),
        };
        let cancel = self.cancel.clone();
        *self.task.lock().await = Some(tokio::spawn(inbound.run(events, cancel)));
        info!("sync client started");

        self.connection.connect().await
    }

    /// Activate the transport if it is not already.
    pub async fn connect(&self) -> Result<(), MurmurError> {
        self.connection.connect().await
    }

    /// Tear down the transport and forget active subscriptions.
    ///
    /// The desired set is kept, so the next `connect` restores it.
    pub async fn disconnect(&self) -> Result<(), MurmurError> {
        self.registry.clear_active().await;
        self.connection.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Wait for the handshake, giving up after `timeout`.
    pub async fn wait_until_connected(&self, timeout: Duration) -> Result<(), MurmurError> {
        tokio::time::timeout(timeout, self.connection.wait_until_connected())
            .await
            .map_err(|_| MurmurError::transport(format!("not connected after {timeout:?}")))
    }

    pub async fn subscribe(&self, conversation_id: ConversationId) -> Result<(), MurmurError> {
        self.registry.subscribe(conversation_id).await
    }

    pub async fn unsubscribe(&self, conversation_id: ConversationId) {
        self.registry.unsubscribe(conversation_id).await;
    }

    pub async fn load_initial(
        &self,
        conversation_id: ConversationId,
    ) -> Result<PageOutcome, MurmurError> {
        self.pagination.load_initial(conversation_id).await
    }

    pub async fn load_more(&self, conversation_id: ConversationId) -> Result<PageOutcome, MurmurError> {
        self.pagination.load_more(conversation_id).await
    }

    pub async fn send(
        &self,
        conversation_id: ConversationId,
        content: &str,
        content_type: ContentType,
        parent_id: Option<MessageId>,
    ) -> Result<SendReceipt, MurmurError> {
        self.sender
            .send(conversation_id, content, content_type, parent_id)
            .await
    }

    /// Stop the event loop and disconnect.
    pub async fn shutdown(&self) -> Result<(), MurmurError> {
        self.cancel.cancel();
        let result = self.disconnect().await;
        if let Some(task) = self.task.lock().await.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "inbound loop ended abnormally");
        }
        info!("sync client stopped");
        result
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("connection", &self.connection)
            .field("pagination", &self.pagination)
            .finish_non_exhaustive()
    }
}

/// Consumes transport events and applies them.
struct InboundLoop {
    cache: Arc<MessageCache>,
    connection: Arc<ConnectionManager>,
    registry: Arc<SubscriptionRegistry>,
}

impl InboundLoop {
    async fn run(self, mut events: mpsc::Receiver<TransportEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("inbound loop cancelled");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("transport event channel closed");
                        break;
                    };
                    self.handle(event).await;
                }
            }
        }
    }

    async fn handle(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if self.connection.on_transport_event(&TransportEvent::Connected) {
                    self.registry.resubscribe_all().await;
                }
            }
            event @ TransportEvent::Disconnected { .. } => {
                self.connection.on_transport_event(&event);
                self.registry.clear_active().await;
            }
            TransportEvent::Frame { topic, body, .. } => {
                let conversation_id = self.registry.scheme().conversation_for(&topic);
                match frame::decode(&body) {
                    Ok(event) => self.apply(conversation_id, event),
                    Err(e) => warn!(topic = %topic, error = %e, "dropping malformed frame"),
                }
            }
            TransportEvent::Error { message } => {
                warn!(error = %message, "transport reported an error");
            }
        }
    }

    /// Apply a decoded event. `topic_conversation` is the conversation whose
    /// topic carried the frame, used when the payload omits it.
    fn apply(&self, topic_conversation: Option<ConversationId>, event: InboundEvent) {
        match event {
            InboundEvent::MessageNew(message) => {
                self.cache.add_message(message);
            }
            InboundEvent::MessageUpdate(message) => {
                let message_id = message.message_id;
                if message.is_deleted {
                    self.cache.delete_message(message.conversation_id, message_id);
                } else if !self
                    .cache
                    .update_message(message_id, &MessagePatch::from_message(&message))
                {
                    debug!(message_id = %message_id, "update for uncached message ignored");
                }
            }
            InboundEvent::MessageDelete {
                conversation_id,
                message_id,
            } => {
                let conversation_id = conversation_id
                    .or(topic_conversation)
                    .or_else(|| self.cache.message(message_id).map(|m| m.conversation_id));
                if let Some(conversation_id) = conversation_id {
                    self.cache.delete_message(conversation_id, message_id);
                }
            }
            InboundEvent::Reaction { message_id, change } => {
                self.cache
                    .update_message(message_id, &MessagePatch::reaction(change));
            }
            InboundEvent::Typing {
                conversation_id,
                user,
            } => {
                if let Some(conversation_id) = conversation_id.or(topic_conversation) {
                    self.cache.add_typing_user(conversation_id, user);
                }
            }
            InboundEvent::StopTyping {
                conversation_id,
                user_id,
            } => {
                if let Some(conversation_id) = conversation_id.or(topic_conversation) {
                    self.cache.remove_typing_user(conversation_id, user_id);
                }
            }
            InboundEvent::Ignored { event_type } => {
                debug!(event_type = %event_type, "ignoring unhandled event type");
            }
        }
    }
}
