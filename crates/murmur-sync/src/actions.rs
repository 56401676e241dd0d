// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Edit, delete, and reaction actions on existing messages.
//!
//! Each action calls the REST endpoint first and only touches the cache
//! once the server accepted the change.

use std::sync::Arc;

use tracing::debug;

use murmur_cache::MessageCache;
use murmur_core::types::{ConversationId, Message, MessageId, MessagePatch, Reaction, ReactionChange};
use murmur_core::{MurmurError, MutationApi};

/// Mutations on existing messages, mirrored into the cache.
pub struct MessageActions {
    api: Arc<dyn MutationApi>,
    cache: Arc<MessageCache>,
    account_id: Option<i64>,
}

impl MessageActions {
    /// `account_id` identifies the signed-in user for local reaction patches.
    pub fn new(api: Arc<dyn MutationApi>, cache: Arc<MessageCache>, account_id: Option<i64>) -> Self {
        Self {
            api,
            cache,
            account_id,
        }
    }

    /// Replace a message's content and merge the server copy into the cache.
    pub async fn edit(&self, message_id: MessageId, content: &str) -> Result<Message, MurmurError> {
        if content.trim().is_empty() {
            return Err(MurmurError::InvalidInput(
                "edited content must not be empty".to_string(),
            ));
        }
        let updated = self.api.edit_message(message_id, content).await?;
        self.cache
            .update_message(message_id, &MessagePatch::from_message(&updated));
        debug!(message_id = %message_id, "message edited");
        Ok(updated)
    }

    /// Soft-delete a message.
    pub async fn delete(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<(), MurmurError> {
        self.api.delete_message(message_id).await?;
        self.cache.delete_message(conversation_id, message_id);
        debug!(conversation_id = %conversation_id, message_id = %message_id, "message deleted");
        Ok(())
    }

    pub async fn add_reaction(&self, message_id: MessageId, emoji: &str) -> Result<(), MurmurError> {
        self.api.add_reaction(message_id, emoji).await?;
        if let Some(account_id) = self.account_id {
            self.cache.update_message(
                message_id,
                &MessagePatch::reaction(ReactionChange::Added(Reaction {
                    account_id,
                    emoji: emoji.to_string(),
                    reacted_at: chrono::Utc::now().timestamp_millis(),
                })),
            );
        }
        Ok(())
    }

    pub async fn remove_reaction(&self, message_id: MessageId, emoji: &str) -> Result<(), MurmurError> {
        self.api.remove_reaction(message_id, emoji).await?;
        if let Some(account_id) = self.account_id {
            self.cache.update_message(
                message_id,
                &MessagePatch::reaction(ReactionChange::Removed {
                    account_id,
                    emoji: emoji.to_string(),
                }),
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for MessageActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageActions")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_test_utils::MockMutationApi;

    fn actions() -> (MessageActions, Arc<MockMutationApi>, Arc<MessageCache>) {
        let api = Arc::new(MockMutationApi::new());
        let cache = Arc::new(MessageCache::new());
        let message = Message::text(5, 42, "before", 100);
        api.insert(message.clone());
        cache.set_messages(ConversationId(42), vec![message]);
        (MessageActions::new(api.clone(), cache.clone(), Some(7)), api, cache)
    }

    #[tokio::test]
    async fn edit_updates_cache_with_server_copy() {
        let (actions, _api, cache) = actions();
        let updated = actions.edit(MessageId(5), "after").await.unwrap();
        assert_eq!(updated.content.as_deref(), Some("after"));
        assert_eq!(
            cache.message(MessageId(5)).unwrap().content.as_deref(),
            Some("after")
        );
    }

    #[tokio::test]
    async fn failed_delete_leaves_cache_alone() {
        let (actions, api, cache) = actions();
        api.fail_next("boom");
        assert!(actions.delete(ConversationId(42), MessageId(5)).await.is_err());
        assert!(!cache.message(MessageId(5)).unwrap().is_deleted);

        actions.delete(ConversationId(42), MessageId(5)).await.unwrap();
        assert!(cache.message(MessageId(5)).unwrap().is_deleted);
    }

    #[tokio::test]
    async fn reactions_patch_the_local_copy() {
        let (actions, api, cache) = actions();
        actions.add_reaction(MessageId(5), "👍").await.unwrap();
        actions.add_reaction(MessageId(5), "👍").await.unwrap();
        let reactions = cache.message(MessageId(5)).unwrap().reactions;
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].account_id, 7);

        actions.remove_reaction(MessageId(5), "👍").await.unwrap();
        assert!(cache.message(MessageId(5)).unwrap().reactions.is_empty());
        assert_eq!(api.calls().len(), 3);
    }

    #[tokio::test]
    async fn blank_edit_is_rejected_before_the_request() {
        let (actions, api, _cache) = actions();
        assert!(matches!(
            actions.edit(MessageId(5), "  ").await,
            Err(MurmurError::InvalidInput(_))
        ));
        assert!(api.calls().is_empty());
    }
}
