// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! History pagination.
//!
//! A [`CursorStrategy`] turns the last request and the page it produced into
//! the next request; the [`PaginationCoordinator`] drives it per
//! conversation and merges pages into the cache. Results that arrive after
//! the conversation was reset, or after a newer initial load started, are
//! dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use murmur_cache::MessageCache;
use murmur_config::CursorMode;
use murmur_core::types::{ConversationId, HistoryPage, HistoryRequest};
use murmur_core::{HistoryApi, MurmurError};

/// Computes history requests for one cursor form.
pub trait CursorStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Request for the newest page.
    fn first_request(&self) -> HistoryRequest;

    /// Request for the page after `page`, or `None` when history is exhausted.
    fn next_request(&self, previous: &HistoryRequest, page: &HistoryPage) -> Option<HistoryRequest>;
}

/// `page=N&size=K`, newest page first.
#[derive(Debug, Clone, Copy)]
pub struct PageNumberStrategy {
    size: u32,
}

impl PageNumberStrategy {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }
}

impl CursorStrategy for PageNumberStrategy {
    fn name(&self) -> &'static str {
        "page"
    }

    fn first_request(&self) -> HistoryRequest {
        HistoryRequest::Page {
            page: 0,
            size: self.size,
        }
    }

    fn next_request(&self, previous: &HistoryRequest, page: &HistoryPage) -> Option<HistoryRequest> {
        if page.messages.is_empty() || page.last == Some(true) {
            return None;
        }
        let requested = match previous {
            HistoryRequest::Page { page, .. } => *page,
            HistoryRequest::Before { .. } => return None,
        };
        let current = page.current_page.unwrap_or(requested);
        match page.total_pages {
            Some(total) if current.saturating_add(1) >= total => None,
            Some(_) => Some(HistoryRequest::Page {
                page: current + 1,
                size: self.size,
            }),
            // No metadata: a short page is the last one.
            None if (page.messages.len() as u64) < u64::from(self.size) => None,
            None => Some(HistoryRequest::Page {
                page: current + 1,
                size: self.size,
            }),
        }
    }
}

/// `beforeMessageId=X&limit=K` with X the oldest id seen so far.
#[derive(Debug, Clone, Copy)]
pub struct BeforeIdStrategy {
    limit: u32,
}

impl BeforeIdStrategy {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
        }
    }
}

impl CursorStrategy for BeforeIdStrategy {
    fn name(&self) -> &'static str {
        "before_id"
    }

    fn first_request(&self) -> HistoryRequest {
        HistoryRequest::Before {
            before_id: None,
            limit: self.limit,
        }
    }

    fn next_request(&self, _previous: &HistoryRequest, page: &HistoryPage) -> Option<HistoryRequest> {
        if page.messages.is_empty() {
            return None;
        }
        if let Some(cursor) = page.next_cursor {
            return Some(HistoryRequest::Before {
                before_id: Some(cursor),
                limit: self.limit,
            });
        }
        let oldest = page.oldest_id()?;
        let more = page
            .has_more
            .unwrap_or((page.messages.len() as u64) >= u64::from(self.limit));
        more.then_some(HistoryRequest::Before {
            before_id: Some(oldest),
            limit: self.limit,
        })
    }
}

/// Build the strategy selected by configuration.
pub fn strategy_for(mode: CursorMode, page_size: u32) -> Box<dyn CursorStrategy> {
    match mode {
        CursorMode::Page => Box::new(PageNumberStrategy::new(page_size)),
        CursorMode::BeforeId => Box::new(BeforeIdStrategy::new(page_size)),
    }
}

/// Result of a page load that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page was merged into the cache.
    Loaded { added: usize, exhausted: bool },
    /// Nothing older exists; no request was made.
    Exhausted,
    /// The result arrived for a superseded load and was dropped.
    Discarded,
}

/// Per-conversation pagination window.
#[derive(Debug, Default)]
struct Window {
    loaded: bool,
    next: Option<HistoryRequest>,
    /// Bumped by every initial load.
    load_seq: u64,
}

/// Identifies the load a fetch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    cache_generation: u64,
    load_seq: u64,
}

enum Plan {
    Initial,
    Exhausted,
    Fetch(HistoryRequest, Ticket),
}

/// Drives history loads and merges them into the cache.
pub struct PaginationCoordinator {
    history: Arc<dyn HistoryApi>,
    cache: Arc<MessageCache>,
    strategy: Box<dyn CursorStrategy>,
    windows: Mutex<HashMap<ConversationId, Window>>,
}

impl PaginationCoordinator {
    pub fn new(
        history: Arc<dyn HistoryApi>,
        cache: Arc<MessageCache>,
        strategy: Box<dyn CursorStrategy>,
    ) -> Self {
        Self {
            history,
            cache,
            strategy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn windows(&self) -> std::sync::MutexGuard<'_, HashMap<ConversationId, Window>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the newest page and replace the cached collection with it.
    pub async fn load_initial(&self, conversation_id: ConversationId) -> Result<PageOutcome, MurmurError> {
        let request = self.strategy.first_request();
        let ticket = {
            let mut windows = self.windows();
            let window = windows.entry(conversation_id).or_default();
            window.load_seq += 1;
            Ticket {
                cache_generation: self.cache.generation(conversation_id),
                load_seq: window.load_seq,
            }
        };

        let page = self.fetch(conversation_id, request).await?;
        let next = self.strategy.next_request(&request, &page);
        let added = page.messages.len();

        let mut windows = self.windows();
        if !self.is_current(&windows, conversation_id, ticket) {
            debug!(conversation_id = %conversation_id, "stale initial page discarded");
            return Ok(PageOutcome::Discarded);
        }
        self.cache.set_messages(conversation_id, page.messages);
        let window = windows.entry(conversation_id).or_default();
        window.loaded = true;
        window.next = next;

        debug!(
            conversation_id = %conversation_id,
            strategy = self.strategy.name(),
            count = added,
            exhausted = next.is_none(),
            "initial page loaded"
        );
        Ok(PageOutcome::Loaded {
            added,
            exhausted: next.is_none(),
        })
    }

    /// Fetch the next older page and merge it in front of the cached messages.
    ///
    /// Before any initial load this performs the initial load.
    pub async fn load_more(&self, conversation_id: ConversationId) -> Result<PageOutcome, MurmurError> {
        let plan = {
            let windows = self.windows();
            match windows.get(&conversation_id) {
                Some(window) if window.loaded => match window.next {
                    Some(request) => Plan::Fetch(
                        request,
                        Ticket {
                            cache_generation: self.cache.generation(conversation_id),
                            load_seq: window.load_seq,
                        },
                    ),
                    None => Plan::Exhausted,
                },
                _ => Plan::Initial,
            }
        };

        let (request, ticket) = match plan {
            Plan::Initial => return self.load_initial(conversation_id).await,
            Plan::Exhausted => return Ok(PageOutcome::Exhausted),
            Plan::Fetch(request, ticket) => (request, ticket),
        };

        let page = self.fetch(conversation_id, request).await?;
        let next = self.strategy.next_request(&request, &page);

        let mut windows = self.windows();
        if !self.is_current(&windows, conversation_id, ticket) {
            debug!(conversation_id = %conversation_id, "stale page discarded");
            return Ok(PageOutcome::Discarded);
        }
        let window = windows.entry(conversation_id).or_default();
        if window.next != Some(request) {
            // A concurrent load_more already consumed this cursor.
            debug!(conversation_id = %conversation_id, "duplicate page discarded");
            return Ok(PageOutcome::Discarded);
        }
        let added = self.cache.prepend_messages(conversation_id, page.messages);
        window.next = next;

        debug!(
            conversation_id = %conversation_id,
            added,
            exhausted = next.is_none(),
            "older page merged"
        );
        Ok(PageOutcome::Loaded {
            added,
            exhausted: next.is_none(),
        })
    }

    /// Whether the oldest page has been reached.
    pub fn is_exhausted(&self, conversation_id: ConversationId) -> bool {
        self.windows()
            .get(&conversation_id)
            .is_some_and(|w| w.loaded && w.next.is_none())
    }

    pub fn has_loaded(&self, conversation_id: ConversationId) -> bool {
        self.windows()
            .get(&conversation_id)
            .is_some_and(|w| w.loaded)
    }

    /// Drop a conversation's cached messages and pagination state.
    ///
    /// Any fetch still in flight for it is discarded when it returns.
    pub fn reset(&self, conversation_id: ConversationId) {
        let mut windows = self.windows();
        let load_seq = windows
            .get(&conversation_id)
            .map_or(0, |w| w.load_seq);
        windows.insert(
            conversation_id,
            Window {
                loaded: false,
                next: None,
                load_seq: load_seq + 1,
            },
        );
        self.cache.reset_conversation(conversation_id);
    }

    fn is_current(
        &self,
        windows: &HashMap<ConversationId, Window>,
        conversation_id: ConversationId,
        ticket: Ticket,
    ) -> bool {
        let load_seq = windows.get(&conversation_id).map_or(0, |w| w.load_seq);
        load_seq == ticket.load_seq
            && self.cache.generation(conversation_id) == ticket.cache_generation
    }

    async fn fetch(
        &self,
        conversation_id: ConversationId,
        request: HistoryRequest,
    ) -> Result<HistoryPage, MurmurError> {
        self.history
            .fetch_page(conversation_id, request)
            .await
            .map_err(|e| {
                warn!(conversation_id = %conversation_id, error = %e, "history fetch failed");
                match e {
                    e @ MurmurError::HistoryFetchFailure { .. } => e,
                    other => MurmurError::HistoryFetchFailure {
                        conversation_id,
                        message: other.to_string(),
                        source: Some(Box::new(other)),
                    },
                }
            })
    }
}

impl std::fmt::Debug for PaginationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationCoordinator")
            .field("strategy", &self.strategy.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::types::{Message, MessageId};

    fn page(ids: std::ops::RangeInclusive<i64>) -> HistoryPage {
        HistoryPage::with_messages(ids.map(|id| Message::text(id, 1, "m", id)).collect())
    }

    #[test]
    fn page_number_stops_on_last_page() {
        let strategy = PageNumberStrategy::new(2);
        let first = strategy.first_request();
        assert_eq!(first, HistoryRequest::Page { page: 0, size: 2 });

        let mut p = page(4..=5);
        p.current_page = Some(0);
        p.total_pages = Some(3);
        let second = strategy.next_request(&first, &p).unwrap();
        assert_eq!(second, HistoryRequest::Page { page: 1, size: 2 });

        p.current_page = Some(2);
        assert_eq!(strategy.next_request(&second, &p), None);

        p.current_page = Some(0);
        p.last = Some(true);
        assert_eq!(strategy.next_request(&first, &p), None);
    }

    #[test]
    fn page_number_without_metadata_uses_short_page() {
        let strategy = PageNumberStrategy::new(3);
        let first = strategy.first_request();
        assert!(strategy.next_request(&first, &page(1..=3)).is_some());
        assert!(strategy.next_request(&first, &page(1..=2)).is_none());
        assert!(strategy.next_request(&first, &HistoryPage::default()).is_none());
    }

    #[test]
    fn before_id_uses_oldest_id_and_short_page() {
        let strategy = BeforeIdStrategy::new(3);
        let first = strategy.first_request();
        assert_eq!(
            strategy.next_request(&first, &page(7..=9)),
            Some(HistoryRequest::Before {
                before_id: Some(MessageId(7)),
                limit: 3
            })
        );
        assert_eq!(strategy.next_request(&first, &page(1..=2)), None);
    }

    #[test]
    fn before_id_honors_server_hints() {
        let strategy = BeforeIdStrategy::new(3);
        let first = strategy.first_request();

        let mut full_but_last = page(1..=3);
        full_but_last.has_more = Some(false);
        assert_eq!(strategy.next_request(&first, &full_but_last), None);

        let mut cursor = page(7..=9);
        cursor.next_cursor = Some(MessageId(5));
        assert_eq!(
            strategy.next_request(&first, &cursor),
            Some(HistoryRequest::Before {
                before_id: Some(MessageId(5)),
                limit: 3
            })
        );
    }

    #[test]
    fn before_id_stops_on_empty_page_despite_cursor() {
        let strategy = BeforeIdStrategy::new(3);
        let previous = HistoryRequest::Before {
            before_id: Some(MessageId(7)),
            limit: 3,
        };
        let empty = HistoryPage {
            next_cursor: Some(MessageId(7)),
            has_more: Some(true),
            ..HistoryPage::default()
        };
        assert_eq!(strategy.next_request(&previous, &empty), None);
    }

    #[test]
    fn strategy_follows_config() {
        assert_eq!(strategy_for(CursorMode::Page, 50).name(), "page");
        assert_eq!(strategy_for(CursorMode::BeforeId, 50).name(), "before_id");
    }
}
