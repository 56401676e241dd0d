// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the cache, the sync core, and the adapters.
//!
//! Wire representations use camelCase JSON, matching the chat server's REST
//! and broadcast payloads.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Server-assigned identifier of a conversation (channel or DM thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned message identifier. Globally unique and increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rendering hint for message content.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ContentType {
    #[default]
    Text,
    Markdown,
    Code,
    System,
}

/// Kind of conversation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationType {
    #[default]
    Channel,
    DmPair,
    DmGroup,
}

/// Snapshot of the sender's profile at the time the message was serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub account_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One emoji reaction. Reactions on a message form a set keyed by
/// `(account_id, emoji)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub account_id: i64,
    pub emoji: String,
    #[serde(default)]
    pub reacted_at: i64,
}

impl Reaction {
    fn same_key(&self, account_id: i64, emoji: &str) -> bool {
        self.account_id == account_id && self.emoji == emoji
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_id: i64,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_type: String,
}

/// A chat message as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub sender: Option<Profile>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub reactions: Vec<Reaction>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub mentions: Vec<i64>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub attachments: Vec<Attachment>,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Message {
    /// Minimal text message, mostly useful for tests and fixtures.
    pub fn text(
        message_id: i64,
        conversation_id: i64,
        content: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            message_id: MessageId(message_id),
            conversation_id: ConversationId(conversation_id),
            sender: None,
            content: Some(content.into()),
            content_type: ContentType::Text,
            parent_id: None,
            is_deleted: false,
            is_pinned: false,
            reply_count: 0,
            reactions: Vec::new(),
            mentions: Vec::new(),
            attachments: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Account id of the sender, when the profile snapshot is present.
    pub fn sender_id(&self) -> Option<i64> {
        self.sender.as_ref().map(|p| p.account_id)
    }

    /// Render order: `created_at` ascending, ties broken by `message_id`.
    pub fn render_order(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.message_id.cmp(&other.message_id))
    }

    /// Mark as soft-deleted. The entry keeps its position; content is cleared.
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.content = None;
    }
}

/// Treat an explicit JSON `null` the same as a missing collection.
fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A reaction mutation applied against a message's reaction set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionChange {
    Added(Reaction),
    Removed { account_id: i64, emoji: String },
}

/// Partial update merged into a cached message.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub content_type: Option<ContentType>,
    pub is_pinned: Option<bool>,
    pub reply_count: Option<u32>,
    pub reactions: Option<Vec<Reaction>>,
    pub reaction: Option<ReactionChange>,
    pub attachments: Option<Vec<Attachment>>,
    pub updated_at: Option<i64>,
}

impl MessagePatch {
    /// Patch carrying every mutable field of a server copy.
    pub fn from_message(message: &Message) -> Self {
        Self {
            content: message.content.clone(),
            content_type: Some(message.content_type),
            is_pinned: Some(message.is_pinned),
            reply_count: Some(message.reply_count),
            reactions: Some(message.reactions.clone()),
            reaction: None,
            attachments: Some(message.attachments.clone()),
            updated_at: Some(message.updated_at),
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn reaction(change: ReactionChange) -> Self {
        Self {
            reaction: Some(change),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge this patch into `message`.
    ///
    /// Content edits on a soft-deleted message are ignored.
    pub fn apply(&self, message: &mut Message) {
        if let Some(content) = &self.content
            && !message.is_deleted
        {
            message.content = Some(content.clone());
        }
        if let Some(content_type) = self.content_type {
            message.content_type = content_type;
        }
        if let Some(pinned) = self.is_pinned {
            message.is_pinned = pinned;
        }
        if let Some(count) = self.reply_count {
            message.reply_count = count;
        }
        if let Some(reactions) = &self.reactions {
            message.reactions = reactions.clone();
        }
        match &self.reaction {
            Some(ReactionChange::Added(reaction)) => {
                if !message
                    .reactions
                    .iter()
                    .any(|r| r.same_key(reaction.account_id, &reaction.emoji))
                {
                    message.reactions.push(reaction.clone());
                }
            }
            Some(ReactionChange::Removed { account_id, emoji }) => {
                message.reactions.retain(|r| !r.same_key(*account_id, emoji));
            }
            None => {}
        }
        if let Some(attachments) = &self.attachments {
            message.attachments = attachments.clone();
        }
        if let Some(updated_at) = self.updated_at {
            message.updated_at = updated_at;
        }
    }
}

/// Denormalized pointer to the newest message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub message_id: MessageId,
    #[serde(default)]
    pub content: Option<String>,
    pub created_at: i64,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.message_id,
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// A channel or direct-message thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: ConversationId,
    pub workspace_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub conversation_type: ConversationType,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Conversation {
    pub fn new(conversation_id: i64, workspace_id: i64, conversation_type: ConversationType) -> Self {
        Self {
            conversation_id: ConversationId(conversation_id),
            workspace_id,
            name: None,
            conversation_type,
            is_private: false,
            is_archived: false,
            last_message: None,
            unread_count: 0,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// A user currently typing in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingUser {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// An optimistic local record of a message that was published but not yet
/// echoed back by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub correlation_key: Uuid,
    pub conversation_id: ConversationId,
    pub content: String,
    pub content_type: ContentType,
    pub parent_id: Option<MessageId>,
    pub queued_at: i64,
}

impl PendingMessage {
    /// Whether `confirmed` is the server copy of this pending entry.
    pub fn matches(&self, confirmed: &Message) -> bool {
        self.conversation_id == confirmed.conversation_id
            && confirmed.content.as_deref() == Some(self.content.as_str())
            && self.content_type == confirmed.content_type
            && self.parent_id == confirmed.parent_id
    }
}

/// Body published to a conversation's send destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPayload {
    pub conversation_id: ConversationId,
    pub content: String,
    pub content_type: ContentType,
    pub parent_id: Option<MessageId>,
}

/// One request against the history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRequest {
    /// Page-number cursor: `page` is zero-based.
    Page { page: u32, size: u32 },
    /// Id-boundary cursor: messages strictly older than `before_id`;
    /// `None` asks for the newest page.
    Before {
        before_id: Option<MessageId>,
        limit: u32,
    },
}

impl HistoryRequest {
    /// Number of messages requested.
    pub fn page_size(&self) -> u32 {
        match self {
            Self::Page { size, .. } => *size,
            Self::Before { limit, .. } => *limit,
        }
    }
}

/// A page of history plus whatever pagination metadata the server sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    #[serde(rename = "data", default, deserialize_with = "nullable_vec")]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub total_elements: Option<u64>,
    #[serde(default)]
    pub last: Option<bool>,
    #[serde(default)]
    pub has_more: Option<bool>,
    #[serde(default)]
    pub next_cursor: Option<MessageId>,
}

impl HistoryPage {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Smallest message id on this page.
    pub fn oldest_id(&self) -> Option<MessageId> {
        self.messages.iter().map(|m| m.message_id).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_deserializes_from_server_shape() {
        let json = r#"{
            "messageId": 101,
            "conversationId": 42,
            "sender": {"accountId": 7, "username": "an", "displayName": "An", "avatarUrl": null, "status": "ONLINE"},
            "content": "hello",
            "contentType": "MARKDOWN",
            "isDeleted": false,
            "isPinned": true,
            "parentId": null,
            "replyCount": 2,
            "reactions": null,
            "mentions": [3],
            "attachments": null,
            "createdAt": 1000,
            "updatedAt": 1500
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_id, MessageId(101));
        assert_eq!(msg.conversation_id, ConversationId(42));
        assert_eq!(msg.sender_id(), Some(7));
        assert_eq!(msg.content_type, ContentType::Markdown);
        assert!(msg.is_pinned);
        assert!(msg.reactions.is_empty());
        assert_eq!(msg.mentions, vec![3]);
        assert_eq!(msg.updated_at, 1500);
    }

    #[test]
    fn render_order_breaks_ties_by_id() {
        let a = Message::text(5, 1, "a", 1000);
        let b = Message::text(4, 1, "b", 1000);
        let c = Message::text(1, 1, "c", 2000);
        assert_eq!(a.render_order(&b), Ordering::Greater);
        assert_eq!(b.render_order(&c), Ordering::Less);
    }

    #[test]
    fn patch_adds_reaction_once() {
        let mut msg = Message::text(1, 1, "hi", 10);
        let add = MessagePatch::reaction(ReactionChange::Added(Reaction {
            account_id: 9,
            emoji: "👍".into(),
            reacted_at: 11,
        }));
        add.apply(&mut msg);
        add.apply(&mut msg);
        assert_eq!(msg.reactions.len(), 1);

        MessagePatch::reaction(ReactionChange::Removed {
            account_id: 9,
            emoji: "👍".into(),
        })
        .apply(&mut msg);
        assert!(msg.reactions.is_empty());
    }

    #[test]
    fn patch_does_not_resurrect_deleted_content() {
        let mut msg = Message::text(1, 1, "hi", 10);
        msg.soft_delete();
        MessagePatch::content("edited").apply(&mut msg);
        assert!(msg.is_deleted);
        assert_eq!(msg.content, None);
    }

    #[test]
    fn outbound_payload_serializes_null_parent() {
        let payload = OutboundPayload {
            conversation_id: ConversationId(42),
            content: "hi".into(),
            content_type: ContentType::Text,
            parent_id: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "conversationId": 42,
                "content": "hi",
                "contentType": "TEXT",
                "parentId": null
            })
        );
    }

    #[test]
    fn pending_matches_confirmed_copy() {
        let pending = PendingMessage {
            correlation_key: Uuid::new_v4(),
            conversation_id: ConversationId(42),
            content: "hi".into(),
            content_type: ContentType::Text,
            parent_id: None,
            queued_at: 0,
        };
        assert!(pending.matches(&Message::text(1, 42, "hi", 5)));
        assert!(!pending.matches(&Message::text(1, 42, "other", 5)));
        assert!(!pending.matches(&Message::text(1, 43, "hi", 5)));
    }

    #[test]
    fn history_page_reads_spring_style_metadata() {
        let json = r#"{"data": [], "currentPage": 2, "totalPages": 3, "totalElements": 120, "size": 50}"#;
        let page: HistoryPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.current_page, Some(2));
        assert_eq!(page.total_pages, Some(3));
        assert!(page.messages.is_empty());
        assert_eq!(page.oldest_id(), None);
    }

    #[test]
    fn conversation_type_uses_type_key() {
        let json = r#"{"conversationId": 1, "workspaceId": 2, "type": "DM_GROUP", "isPrivate": true}"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conv.conversation_type, ConversationType::DmGroup);
        assert!(conv.is_private);
        assert_eq!(conv.unread_count, 0);
    }
}
