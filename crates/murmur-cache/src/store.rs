// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message cache and its mutation API.
//!
//! All state sits behind one `RwLock` that is never held across an await,
//! so each mutation (dedupe-then-insert, merge-then-sort) is atomic with
//! respect to every other mutation and read.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

use murmur_core::types::{
    Conversation, ConversationId, LastMessage, Message, MessageId, MessagePatch, PendingMessage,
    TypingUser,
};

use crate::event::CacheEvent;
use crate::merge;

/// Capacity of the change notification channel.
const EVENT_CAPACITY: usize = 1024;

/// Result of [`MessageCache::add_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    Duplicate,
}

#[derive(Debug, Default)]
struct CacheState {
    messages: HashMap<ConversationId, Vec<Message>>,
    conversations: Vec<Conversation>,
    pending: HashMap<ConversationId, Vec<PendingMessage>>,
    typing: HashMap<ConversationId, Vec<TypingUser>>,
    generations: HashMap<ConversationId, u64>,
    focused: Option<ConversationId>,
}

impl CacheState {
    fn conversation_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.conversation_id == id)
    }

    /// Point `last_message` at `candidate` if it is newer than what we have.
    fn observe(&mut self, id: ConversationId, candidate: Option<LastMessage>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        let Some(conversation) = self.conversation_mut(id) else {
            return false;
        };
        let newer = conversation.last_message.as_ref().is_none_or(|current| {
            (candidate.created_at, candidate.message_id)
                > (current.created_at, current.message_id)
        });
        if newer {
            conversation.updated_at = conversation.updated_at.max(candidate.created_at);
            conversation.last_message = Some(candidate);
        }
        newer
    }

    fn newest_visible(&self, id: ConversationId) -> Option<LastMessage> {
        self.messages
            .get(&id)
            .and_then(|messages| merge::newest_visible(messages))
            .map(LastMessage::from)
    }
}

/// The canonical per-conversation message store.
#[derive(Debug)]
pub struct MessageCache {
    state: RwLock<CacheState>,
    events: broadcast::Sender<CacheEvent>,
    self_account_id: Option<i64>,
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(CacheState::default()),
            events,
            self_account_id: None,
        }
    }

    /// Create an empty cache that knows the signed-in account, so the user's
    /// own messages never count as unread.
    pub fn with_account(account_id: i64) -> Self {
        Self {
            self_account_id: Some(account_id),
            ..Self::new()
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CacheEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    // --- Messages ---

    /// Replace a conversation's whole collection with an authoritative set.
    pub fn set_messages(&self, conversation_id: ConversationId, messages: Vec<Message>) {
        let messages = merge::normalize(messages);
        let count = messages.len();
        {
            let mut state = self.write();
            state.messages.insert(conversation_id, messages);
            let newest = state.newest_visible(conversation_id);
            state.observe(conversation_id, newest);
        }
        debug!(conversation_id = %conversation_id, count, "messages replaced");
        self.emit(CacheEvent::MessagesReplaced {
            conversation_id,
            count,
        });
    }

    /// Insert one message (live push or echo). Duplicate ids are ignored.
    ///
    /// On insert, the owning conversation's `last_message` moves forward if
    /// this is the newest visible message, unread is bumped for conversations
    /// other than the focused one, and a matching pending entry is retired.
    pub fn add_message(&self, message: Message) -> AddOutcome {
        let conversation_id = message.conversation_id;
        let message_id = message.message_id;
        let from_self = self.self_account_id.is_some() && message.sender_id() == self.self_account_id;
        // Pending entries are ours; another account's copy never confirms one.
        let may_confirm = from_self || self.self_account_id.is_none() || message.sender_id().is_none();
        let candidate = (!message.is_deleted).then(|| LastMessage::from(&message));

        let pending_retired;
        let conversation_changed;
        {
            let mut state = self.write();
            let pending_key = state
                .pending
                .get(&conversation_id)
                .filter(|_| may_confirm)
                .and_then(|pending| pending.iter().find(|p| p.matches(&message)))
                .map(|p| p.correlation_key);

            let collection = state.messages.entry(conversation_id).or_default();
            if !merge::insert_sorted(collection, message) {
                trace!(
                    conversation_id = %conversation_id,
                    message_id = %message_id,
                    "duplicate message skipped"
                );
                return AddOutcome::Duplicate;
            }

            pending_retired = match pending_key {
                Some(key) => remove_pending(&mut state.pending, conversation_id, key),
                None => false,
            };

            let mut changed = state.observe(conversation_id, candidate);
            if state.focused != Some(conversation_id)
                && !from_self
                && let Some(conversation) = state.conversation_mut(conversation_id)
            {
                conversation.unread_count = conversation.unread_count.saturating_add(1);
                changed = true;
            }
            conversation_changed = changed;
        }

        self.emit(CacheEvent::MessageAdded {
            conversation_id,
            message_id,
        });
        if pending_retired {
            self.emit(CacheEvent::PendingChanged { conversation_id });
        }
        if conversation_changed {
            self.emit(CacheEvent::ConversationUpdated { conversation_id });
        }
        AddOutcome::Inserted
    }

    /// Merge `patch` into the message with `message_id`, wherever it lives.
    ///
    /// Returns `false` when no cached conversation holds that id.
    pub fn update_message(&self, message_id: MessageId, patch: &MessagePatch) -> bool {
        let conversation_id = {
            let mut state = self.write();
            let found = state.messages.iter_mut().find_map(|(id, messages)| {
                messages
                    .iter_mut()
                    .find(|m| m.message_id == message_id)
                    .map(|m| {
                        patch.apply(m);
                        *id
                    })
            });
            let Some(conversation_id) = found else {
                trace!(message_id = %message_id, "update for uncached message dropped");
                return false;
            };
            refresh_last_message(&mut state, conversation_id, message_id);
            conversation_id
        };

        self.emit(CacheEvent::MessageUpdated {
            conversation_id,
            message_id,
        });
        true
    }

    /// Soft-delete a message in place. Length and order are unchanged.
    pub fn delete_message(&self, conversation_id: ConversationId, message_id: MessageId) -> bool {
        {
            let mut state = self.write();
            let Some(message) = state
                .messages
                .get_mut(&conversation_id)
                .and_then(|messages| messages.iter_mut().find(|m| m.message_id == message_id))
            else {
                return false;
            };
            message.soft_delete();
            refresh_last_message(&mut state, conversation_id, message_id);
        }

        self.emit(CacheEvent::MessageDeleted {
            conversation_id,
            message_id,
        });
        true
    }

    /// Merge an older history page into a conversation.
    ///
    /// Union by id (cached entries win) followed by a full resort, so
    /// messages appended live while the page was in flight stay put.
    /// Returns the number of messages added.
    pub fn prepend_messages(&self, conversation_id: ConversationId, older: Vec<Message>) -> usize {
        let added = {
            let mut state = self.write();
            let collection = state.messages.entry(conversation_id).or_default();
            let added = merge::union_resort(collection, older);
            let newest = state.newest_visible(conversation_id);
            state.observe(conversation_id, newest);
            added
        };

        debug!(conversation_id = %conversation_id, added, "page merged");
        self.emit(CacheEvent::PagePrepended {
            conversation_id,
            added,
        });
        added
    }

    /// Snapshot of a conversation's messages in render order.
    pub fn messages(&self, conversation_id: ConversationId) -> Vec<Message> {
        self.read()
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Ids of a conversation's messages in render order.
    pub fn message_ids(&self, conversation_id: ConversationId) -> Vec<MessageId> {
        self.read()
            .messages
            .get(&conversation_id)
            .map(|messages| messages.iter().map(|m| m.message_id).collect())
            .unwrap_or_default()
    }

    /// Look up one message by id across all conversations.
    pub fn message(&self, message_id: MessageId) -> Option<Message> {
        self.read()
            .messages
            .values()
            .flat_map(|messages| messages.iter())
            .find(|m| m.message_id == message_id)
            .cloned()
    }

    /// Number of cached messages in a conversation.
    pub fn len(&self, conversation_id: ConversationId) -> usize {
        self.read()
            .messages
            .get(&conversation_id)
            .map_or(0, Vec::len)
    }

    /// Whether a conversation has no cached messages.
    pub fn is_empty(&self, conversation_id: ConversationId) -> bool {
        self.len(conversation_id) == 0
    }

    /// Oldest cached message id in a conversation.
    pub fn oldest_id(&self, conversation_id: ConversationId) -> Option<MessageId> {
        self.read()
            .messages
            .get(&conversation_id)
            .and_then(|messages| messages.iter().map(|m| m.message_id).min())
    }

    // --- Pending outbound entries ---

    /// Record an optimistic entry for a published but unconfirmed message.
    pub fn insert_pending(&self, pending: PendingMessage) {
        let conversation_id = pending.conversation_id;
        self.write()
            .pending
            .entry(conversation_id)
            .or_default()
            .push(pending);
        self.emit(CacheEvent::PendingChanged { conversation_id });
    }

    /// Drop a pending entry by correlation key.
    pub fn discard_pending(&self, conversation_id: ConversationId, correlation_key: Uuid) -> bool {
        let removed = remove_pending(&mut self.write().pending, conversation_id, correlation_key);
        if removed {
            self.emit(CacheEvent::PendingChanged { conversation_id });
        }
        removed
    }

    /// Pending entries of a conversation, oldest first.
    pub fn pending(&self, conversation_id: ConversationId) -> Vec<PendingMessage> {
        self.read()
            .pending
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    // --- Conversations ---

    /// Replace the conversation listing (e.g. after loading a workspace).
    pub fn set_conversations(&self, conversations: Vec<Conversation>) {
        self.write().conversations = conversations;
        self.emit(CacheEvent::ConversationsReplaced);
    }

    /// Insert a conversation, or replace the one with the same id.
    pub fn upsert_conversation(&self, conversation: Conversation) {
        let conversation_id = conversation.conversation_id;
        {
            let mut state = self.write();
            match state.conversation_mut(conversation_id) {
                Some(existing) => *existing = conversation,
                None => state.conversations.insert(0, conversation),
            }
        }
        self.emit(CacheEvent::ConversationUpdated { conversation_id });
    }

    /// Remove a conversation the user left, with everything cached for it.
    pub fn remove_conversation(&self, conversation_id: ConversationId) -> bool {
        let removed = {
            let mut state = self.write();
            let before = state.conversations.len();
            state
                .conversations
                .retain(|c| c.conversation_id != conversation_id);
            state.messages.remove(&conversation_id);
            state.pending.remove(&conversation_id);
            state.typing.remove(&conversation_id);
            *state.generations.entry(conversation_id).or_default() += 1;
            if state.focused == Some(conversation_id) {
                state.focused = None;
            }
            state.conversations.len() != before
        };
        if removed {
            self.emit(CacheEvent::ConversationRemoved { conversation_id });
        }
        removed
    }

    /// Snapshot of one conversation.
    pub fn conversation(&self, conversation_id: ConversationId) -> Option<Conversation> {
        self.read()
            .conversations
            .iter()
            .find(|c| c.conversation_id == conversation_id)
            .cloned()
    }

    /// Snapshot of the conversation listing.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.read().conversations.clone()
    }

    /// Mark the conversation currently on screen; it stops accruing unread.
    pub fn set_focused(&self, conversation_id: Option<ConversationId>) {
        self.write().focused = conversation_id;
        if let Some(id) = conversation_id {
            self.reset_unread(id);
        }
    }

    pub fn focused(&self) -> Option<ConversationId> {
        self.read().focused
    }

    pub fn increment_unread(&self, conversation_id: ConversationId) {
        let changed = match self.write().conversation_mut(conversation_id) {
            Some(conversation) => {
                conversation.unread_count = conversation.unread_count.saturating_add(1);
                true
            }
            None => false,
        };
        if changed {
            self.emit(CacheEvent::ConversationUpdated { conversation_id });
        }
    }

    pub fn reset_unread(&self, conversation_id: ConversationId) {
        let changed = match self.write().conversation_mut(conversation_id) {
            Some(conversation) if conversation.unread_count != 0 => {
                conversation.unread_count = 0;
                true
            }
            _ => false,
        };
        if changed {
            self.emit(CacheEvent::ConversationUpdated { conversation_id });
        }
    }

    // --- Typing indicators ---

    /// Record that a user is typing; replaces any earlier entry for that user.
    pub fn add_typing_user(&self, conversation_id: ConversationId, user: TypingUser) {
        {
            let mut state = self.write();
            let users = state.typing.entry(conversation_id).or_default();
            users.retain(|u| u.user_id != user.user_id);
            users.push(user);
        }
        self.emit(CacheEvent::TypingChanged { conversation_id });
    }

    pub fn remove_typing_user(&self, conversation_id: ConversationId, user_id: i64) {
        let removed = {
            let mut state = self.write();
            match state.typing.get_mut(&conversation_id) {
                Some(users) => {
                    let before = users.len();
                    users.retain(|u| u.user_id != user_id);
                    users.len() != before
                }
                None => false,
            }
        };
        if removed {
            self.emit(CacheEvent::TypingChanged { conversation_id });
        }
    }

    pub fn typing_users(&self, conversation_id: ConversationId) -> Vec<TypingUser> {
        self.read()
            .typing
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    // --- Reset ---

    /// Current load generation of a conversation.
    pub fn generation(&self, conversation_id: ConversationId) -> u64 {
        self.read()
            .generations
            .get(&conversation_id)
            .copied()
            .unwrap_or_default()
    }

    /// Drop a conversation's messages and pending entries and start a new
    /// generation, invalidating any history fetch still in flight.
    pub fn reset_conversation(&self, conversation_id: ConversationId) -> u64 {
        let generation = {
            let mut state = self.write();
            state.messages.remove(&conversation_id);
            state.pending.remove(&conversation_id);
            let generation = state.generations.entry(conversation_id).or_default();
            *generation += 1;
            *generation
        };
        debug!(conversation_id = %conversation_id, generation, "conversation reset");
        self.emit(CacheEvent::ConversationReset { conversation_id });
        generation
    }

    /// Clear everything (sign-out).
    pub fn reset(&self) {
        {
            let mut state = self.write();
            let generations = std::mem::take(&mut state.generations)
                .into_iter()
                .map(|(id, generation)| (id, generation + 1))
                .collect();
            *state = CacheState {
                generations,
                ..CacheState::default()
            };
        }
        self.emit(CacheEvent::Cleared);
    }
}

fn remove_pending(
    pending: &mut HashMap<ConversationId, Vec<PendingMessage>>,
    conversation_id: ConversationId,
    correlation_key: Uuid,
) -> bool {
    let Some(entries) = pending.get_mut(&conversation_id) else {
        return false;
    };
    let before = entries.len();
    entries.retain(|p| p.correlation_key != correlation_key);
    let removed = entries.len() != before;
    if entries.is_empty() {
        pending.remove(&conversation_id);
    }
    removed
}

/// Keep `last_message` consistent after `message_id` was edited or deleted.
fn refresh_last_message(state: &mut CacheState, conversation_id: ConversationId, message_id: MessageId) {
    let points_here = state
        .conversations
        .iter()
        .find(|c| c.conversation_id == conversation_id)
        .and_then(|c| c.last_message.as_ref())
        .is_some_and(|last| last.message_id == message_id);
    if !points_here {
        return;
    }
    let newest = state.newest_visible(conversation_id);
    if let Some(conversation) = state.conversation_mut(conversation_id) {
        conversation.last_message = newest;
    }
}
