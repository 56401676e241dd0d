// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical per-conversation message cache.
//!
//! [`MessageCache`] owns every cached message collection. Each collection is
//! unique by message id and sorted by `(created_at, message_id)`; all
//! mutations go through the cache, and readers get cloned snapshots. The
//! cache is shared by handle (`Arc<MessageCache>`), never through global
//! state.

pub mod event;
pub mod merge;
pub mod store;

pub use event::CacheEvent;
pub use store::{AddOutcome, MessageCache};
