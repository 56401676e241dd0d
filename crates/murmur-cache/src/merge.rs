// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure ordering and merge helpers over a single conversation's messages.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use murmur_core::types::{Message, MessageId};

/// Sort by render order and drop duplicate ids. Later occurrences win.
pub fn normalize(messages: Vec<Message>) -> Vec<Message> {
    let mut by_id: HashMap<MessageId, Message> = HashMap::with_capacity(messages.len());
    for message in messages {
        by_id.insert(message.message_id, message);
    }
    let mut out: Vec<Message> = by_id.into_values().collect();
    out.sort_by(Message::render_order);
    out
}

/// Insert `message` at its sorted position.
///
/// Returns `false` without touching `messages` when the id is already present.
pub fn insert_sorted(messages: &mut Vec<Message>, message: Message) -> bool {
    if messages.iter().any(|m| m.message_id == message.message_id) {
        return false;
    }
    // Live messages are almost always the newest.
    match messages.last() {
        Some(last) if last.render_order(&message) == Ordering::Greater => {
            let at = messages.partition_point(|m| m.render_order(&message) == Ordering::Less);
            messages.insert(at, message);
        }
        _ => messages.push(message),
    }
    true
}

/// Union `incoming` into `existing` by id, then resort the whole collection.
///
/// Entries already present win over incoming copies, so a live update that
/// landed while a page was in flight is never overwritten by the older page.
/// Returns the number of messages added.
pub fn union_resort(existing: &mut Vec<Message>, incoming: Vec<Message>) -> usize {
    let mut seen: HashSet<MessageId> = existing.iter().map(|m| m.message_id).collect();
    let before = existing.len();
    for message in incoming {
        if seen.insert(message.message_id) {
            existing.push(message);
        }
    }
    existing.sort_by(Message::render_order);
    existing.len() - before
}

/// Newest non-deleted message by render order.
pub fn newest_visible(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| !m.is_deleted)
}

/// Whether `messages` is strictly increasing in render order.
pub fn is_sorted_unique(messages: &[Message]) -> bool {
    messages
        .windows(2)
        .all(|w| w[0].render_order(&w[1]) == Ordering::Less)
        && messages
            .iter()
            .map(|m| m.message_id)
            .collect::<HashSet<_>>()
            .len()
            == messages.len()
}
