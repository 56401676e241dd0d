// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock history endpoint backed by in-memory message lists.
//!
//! Serves both cursor forms the way the chat server does: page 0 (or "no
//! boundary") is the newest page, and each page holds messages in ascending
//! render order. Fetches can be counted, failed, or held open to simulate
//! slow responses.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use murmur_core::types::{ConversationId, HistoryPage, HistoryRequest, Message};
use murmur_core::{HistoryApi, MurmurError};

/// An in-memory history endpoint.
pub struct MockHistoryApi {
    conversations: Mutex<HashMap<ConversationId, Vec<Message>>>,
    requests: Mutex<Vec<(ConversationId, HistoryRequest)>>,
    failures: Mutex<VecDeque<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    fetches: AtomicUsize,
    report_has_more: bool,
}

impl MockHistoryApi {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            gate: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            report_has_more: false,
        }
    }

    /// Also send `hasMore` on id-boundary pages.
    pub fn with_has_more(mut self) -> Self {
        self.report_has_more = true;
        self
    }

    /// Seed a conversation with `count` messages, ids `1..=count`, one
    /// second apart.
    pub async fn seed(&self, conversation_id: ConversationId, count: i64) {
        let messages = (1..=count)
            .map(|id| Message::text(id, conversation_id.0, format!("message {id}"), id * 1000))
            .collect();
        self.set_messages(conversation_id, messages).await;
    }

    /// Replace a conversation's server-side history.
    pub async fn set_messages(&self, conversation_id: ConversationId, mut messages: Vec<Message>) {
        messages.sort_by(Message::render_order);
        self.conversations
            .lock()
            .await
            .insert(conversation_id, messages);
    }

    /// Fail the next fetch with `message`.
    pub async fn fail_next(&self, message: &str) {
        self.failures.lock().await.push_back(message.to_string());
    }

    /// Hold every subsequent fetch until the returned handle is notified.
    ///
    /// Each `notify_one` releases one held fetch.
    pub async fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().await = Some(notify.clone());
        notify
    }

    /// Stop holding new fetches.
    pub async fn release(&self) {
        *self.gate.lock().await = None;
    }

    /// Number of fetches served, including failed ones.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<(ConversationId, HistoryRequest)> {
        self.requests.lock().await.clone()
    }

    fn page_by_number(messages: &[Message], page: u32, size: u32) -> HistoryPage {
        let size = size.max(1) as usize;
        let total = messages.len();
        let total_pages = total.div_ceil(size);
        let end = total.saturating_sub(page as usize * size);
        let start = end.saturating_sub(size);
        HistoryPage {
            messages: messages[start..end].to_vec(),
            current_page: Some(page),
            total_pages: Some(total_pages as u32),
            total_elements: Some(total as u64),
            ..HistoryPage::default()
        }
    }

    fn page_before(&self, messages: &[Message], request: HistoryRequest) -> HistoryPage {
        let HistoryRequest::Before { before_id, limit } = request else {
            return HistoryPage::default();
        };
        let older: Vec<&Message> = messages
            .iter()
            .filter(|m| before_id.is_none_or(|b| m.message_id < b))
            .collect();
        let start = older.len().saturating_sub(limit.max(1) as usize);
        HistoryPage {
            messages: older[start..].iter().map(|m| (*m).clone()).collect(),
            has_more: self.report_has_more.then_some(start > 0),
            ..HistoryPage::default()
        }
    }
}

impl Default for MockHistoryApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryApi for MockHistoryApi {
    async fn fetch_page(
        &self,
        conversation_id: ConversationId,
        request: HistoryRequest,
    ) -> Result<HistoryPage, MurmurError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push((conversation_id, request));

        let gate = self.gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(message) = self.failures.lock().await.pop_front() {
            return Err(MurmurError::HistoryFetchFailure {
                conversation_id,
                message,
                source: None,
            });
        }

        let conversations = self.conversations.lock().await;
        let messages = conversations
            .get(&conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(match request {
            HistoryRequest::Page { page, size } => Self::page_by_number(messages, page, size),
            before @ HistoryRequest::Before { .. } => self.page_before(messages, before),
        })
    }
}
