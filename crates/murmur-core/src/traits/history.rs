// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! History API capability.

use async_trait::async_trait;

use crate::error::MurmurError;
use crate::types::{ConversationId, HistoryPage, HistoryRequest};

/// Read access to a conversation's message history.
///
/// Implementations must return `MurmurError::HistoryFetchFailure` for any
/// failure so callers can tell a failed page from an empty one.
#[async_trait]
pub trait HistoryApi: Send + Sync + 'static {
    /// Fetch one page of history for `conversation_id`.
    async fn fetch_page(
        &self,
        conversation_id: ConversationId,
        request: HistoryRequest,
    ) -> Result<HistoryPage, MurmurError>;
}
