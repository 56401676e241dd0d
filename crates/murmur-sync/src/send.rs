// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound send pipeline.
//!
//! Sends are publish-and-forget: the server broadcasts the stored message
//! back on the conversation topic and the inbound loop adds it to the cache.
//! There is no outbox; sending while disconnected fails immediately.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use murmur_cache::MessageCache;
use murmur_core::MurmurError;
use murmur_core::types::{ContentType, ConversationId, MessageId, OutboundPayload, PendingMessage};

use crate::connection::ConnectionManager;
use crate::registry::TopicScheme;

/// What a successful send produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub destination: String,
    /// Key of the pending entry, in optimistic mode.
    pub correlation_key: Option<Uuid>,
}

/// Builds and publishes outbound messages.
#[derive(Debug)]
pub struct SendPipeline {
    connection: Arc<ConnectionManager>,
    cache: Arc<MessageCache>,
    scheme: TopicScheme,
    optimistic: bool,
}

impl SendPipeline {
    pub fn new(
        connection: Arc<ConnectionManager>,
        cache: Arc<MessageCache>,
        scheme: TopicScheme,
        optimistic: bool,
    ) -> Self {
        Self {
            connection,
            cache,
            scheme,
            optimistic,
        }
    }

    /// Publish a message to a conversation.
    ///
    /// The cache is never touched on failure. In optimistic mode a pending
    /// entry is recorded after the publish succeeds; the confirmed copy
    /// retires it when it arrives.
    pub async fn send(
        &self,
        conversation_id: ConversationId,
        content: &str,
        content_type: ContentType,
        parent_id: Option<MessageId>,
    ) -> Result<SendReceipt, MurmurError> {
        if content.trim().is_empty() {
            return Err(MurmurError::InvalidInput(
                "message content must not be empty".to_string(),
            ));
        }
        if !self.connection.is_connected() {
            return Err(MurmurError::NotConnected);
        }

        let destination = self.scheme.destination(conversation_id);
        let payload = OutboundPayload {
            conversation_id,
            content: content.to_string(),
            content_type,
            parent_id,
        };
        let body = serde_json::to_string(&payload)
            .map_err(|e| MurmurError::Internal(format!("serialize outbound payload: {e}")))?;

        if let Err(e) = self.connection.transport().publish(&destination, body).await {
            warn!(conversation_id = %conversation_id, error = %e, "publish failed");
            return Err(match e {
                MurmurError::NotConnected => MurmurError::NotConnected,
                other => MurmurError::PublishFailure {
                    destination,
                    message: other.to_string(),
                    source: Some(Box::new(other)),
                },
            });
        }

        let correlation_key = self.optimistic.then(|| {
            let key = Uuid::new_v4();
            self.cache.insert_pending(PendingMessage {
                correlation_key: key,
                conversation_id,
                content: payload.content,
                content_type,
                parent_id,
                queued_at: chrono::Utc::now().timestamp_millis(),
            });
            key
        });

        debug!(
            conversation_id = %conversation_id,
            destination = %destination,
            optimistic = correlation_key.is_some(),
            "message published"
        );
        Ok(SendReceipt {
            destination,
            correlation_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionSettings;
    use murmur_core::{StaticCredentials, TransportEvent};
    use murmur_test_utils::MockTransport;
    use tokio::sync::mpsc;

    async fn pipeline(
        connected: bool,
        optimistic: bool,
    ) -> (SendPipeline, Arc<MockTransport>, Arc<MessageCache>) {
        let transport = Arc::new(MockTransport::new());
        let (tx, _rx) = mpsc::channel(16);
        let connection = Arc::new(ConnectionManager::new(
            transport.clone(),
            Arc::new(StaticCredentials::new(Some("t0k".into()))),
            ConnectionSettings::default(),
            tx,
        ));
        if connected {
            connection.connect().await.unwrap();
            connection.on_transport_event(&TransportEvent::Connected);
        }
        let cache = Arc::new(MessageCache::new());
        let pipeline = SendPipeline::new(connection, cache.clone(), TopicScheme::default(), optimistic);
        (pipeline, transport, cache)
    }

    #[tokio::test]
    async fn publishes_json_body_to_conversation_destination() {
        let (pipeline, transport, cache) = pipeline(true, false).await;
        let receipt = pipeline
            .send(ConversationId(42), "hello", ContentType::Text, None)
            .await
            .unwrap();
        assert_eq!(receipt.destination, "/app/chat/42");
        assert_eq!(receipt.correlation_key, None);

        let published = transport.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "/app/chat/42");
        let body: serde_json::Value = serde_json::from_str(&published[0].1).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "conversationId": 42,
                "content": "hello",
                "contentType": "TEXT",
                "parentId": null
            })
        );
        assert!(cache.is_empty(ConversationId(42)));
    }

    #[tokio::test]
    async fn disconnected_send_fails_fast() {
        let (pipeline, transport, _cache) = pipeline(false, false).await;
        let err = pipeline
            .send(ConversationId(42), "hello", ContentType::Text, None)
            .await
            .unwrap_err();
        assert!(err.is_not_connected());
        assert!(transport.published().await.is_empty());
    }

    #[tokio::test]
    async fn blank_content_is_rejected() {
        let (pipeline, transport, _cache) = pipeline(true, false).await;
        let err = pipeline
            .send(ConversationId(42), " \n\t", ContentType::Text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MurmurError::InvalidInput(_)));
        assert!(transport.published().await.is_empty());
    }

    #[tokio::test]
    async fn publish_failure_leaves_no_pending_entry() {
        let (pipeline, transport, cache) = pipeline(true, true).await;
        transport.fail_publish(true);
        let err = pipeline
            .send(ConversationId(42), "hello", ContentType::Text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MurmurError::PublishFailure { ref destination, .. } if destination == "/app/chat/42"));
        assert!(cache.pending(ConversationId(42)).is_empty());
    }

    #[tokio::test]
    async fn optimistic_send_records_pending_entry() {
        let (pipeline, _transport, cache) = pipeline(true, true).await;
        let receipt = pipeline
            .send(ConversationId(42), "hi", ContentType::Markdown, Some(MessageId(3)))
            .await
            .unwrap();
        let pending = cache.pending(ConversationId(42));
        assert_eq!(pending.len(), 1);
        assert_eq!(Some(pending[0].correlation_key), receipt.correlation_key);
        assert_eq!(pending[0].parent_id, Some(MessageId(3)));
    }
}
