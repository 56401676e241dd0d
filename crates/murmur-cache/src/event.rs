// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change notifications published by the cache.

use murmur_core::types::{ConversationId, MessageId};

/// A completed cache mutation. Mutations that changed nothing publish nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    MessagesReplaced {
        conversation_id: ConversationId,
        count: usize,
    },
    MessageAdded {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    MessageUpdated {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    MessageDeleted {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    PagePrepended {
        conversation_id: ConversationId,
        added: usize,
    },
    PendingChanged {
        conversation_id: ConversationId,
    },
    ConversationUpdated {
        conversation_id: ConversationId,
    },
    ConversationsReplaced,
    ConversationRemoved {
        conversation_id: ConversationId,
    },
    TypingChanged {
        conversation_id: ConversationId,
    },
    ConversationReset {
        conversation_id: ConversationId,
    },
    Cleared,
}
