// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock message mutation endpoints.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use murmur_core::types::{Message, MessageId};
use murmur_core::{MurmurError, MutationApi};

/// One recorded call against [`MockMutationApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationCall {
    Edit { message_id: MessageId, content: String },
    Delete { message_id: MessageId },
    AddReaction { message_id: MessageId, emoji: String },
    RemoveReaction { message_id: MessageId, emoji: String },
}

/// In-memory mutation endpoints. Edits are answered from messages
/// registered with [`MockMutationApi::insert`].
#[derive(Default)]
pub struct MockMutationApi {
    messages: Mutex<HashMap<MessageId, Message>>,
    calls: Mutex<Vec<MutationCall>>,
    fail_next: Mutex<Option<String>>,
}

impl MockMutationApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server-side message so edits can return it.
    pub fn insert(&self, message: Message) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(message.message_id, message);
    }

    /// Fail the next call with an HTTP 500.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }

    /// Calls that reached the endpoint, failed ones excluded.
    pub fn calls(&self) -> Vec<MutationCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self, call: MutationCall) -> Result<(), MurmurError> {
        if let Some(message) = self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(MurmurError::Http {
                status: Some(500),
                message,
                source: None,
            });
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }
}

#[async_trait]
impl MutationApi for MockMutationApi {
    async fn edit_message(&self, message_id: MessageId, content: &str) -> Result<Message, MurmurError> {
        self.check(MutationCall::Edit {
            message_id,
            content: content.to_string(),
        })?;
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        let message = messages.get_mut(&message_id).ok_or_else(|| MurmurError::Http {
            status: Some(404),
            message: format!("message {message_id} not found"),
            source: None,
        })?;
        message.content = Some(content.to_string());
        message.updated_at += 1;
        Ok(message.clone())
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<(), MurmurError> {
        self.check(MutationCall::Delete { message_id })
    }

    async fn add_reaction(&self, message_id: MessageId, emoji: &str) -> Result<(), MurmurError> {
        self.check(MutationCall::AddReaction {
            message_id,
            emoji: emoji.to_string(),
        })
    }

    async fn remove_reaction(&self, message_id: MessageId, emoji: &str) -> Result<(), MurmurError> {
        self.check(MutationCall::RemoveReaction {
            message_id,
            emoji: emoji.to_string(),
        })
    }
}
