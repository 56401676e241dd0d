// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message mutation REST endpoints (edit, soft delete, reactions).

use async_trait::async_trait;

use crate::error::MurmurError;
use crate::types::{Message, MessageId};

/// Write access to existing messages.
#[async_trait]
pub trait MutationApi: Send + Sync + 'static {
    /// Replace the content of a message; returns the updated server copy.
    async fn edit_message(&self, message_id: MessageId, content: &str)
        -> Result<Message, MurmurError>;

    /// Soft-delete a message.
    async fn delete_message(&self, message_id: MessageId) -> Result<(), MurmurError>;

    /// Add the caller's reaction.
    async fn add_reaction(&self, message_id: MessageId, emoji: &str) -> Result<(), MurmurError>;

    /// Remove the caller's reaction.
    async fn remove_reaction(&self, message_id: MessageId, emoji: &str)
        -> Result<(), MurmurError>;
}
