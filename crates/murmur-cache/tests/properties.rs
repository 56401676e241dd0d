// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordering and dedupe properties of the message cache under arbitrary
//! interleavings of live adds, history pages, and deletes.

use murmur_cache::MessageCache;
use murmur_cache::merge::is_sorted_unique;
use murmur_core::types::{ConversationId, Message, MessageId};
use proptest::prelude::*;

const CONV: ConversationId = ConversationId(42);

/// Messages with small id and timestamp ranges so collisions and timestamp
/// ties actually happen.
fn arb_message() -> impl Strategy<Value = Message> {
    (1i64..60, 0i64..20).prop_map(|(id, ts)| Message::text(id, 42, format!("m{id}"), ts * 100))
}

/// Server-consistent messages: one timestamp per id.
fn consistent(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .map(|mut m| {
            m.created_at = (m.message_id.0 % 17) * 100;
            m
        })
        .collect()
}

#[derive(Debug, Clone)]
enum Op {
    Add(Message),
    Prepend(Vec<Message>),
    Delete(i64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => arb_message().prop_map(Op::Add),
        2 => prop::collection::vec(arb_message(), 0..8).prop_map(Op::Prepend),
        1 => (1i64..60).prop_map(Op::Delete),
    ]
}

fn run(cache: &MessageCache, op: Op) {
    match op {
        Op::Add(m) => {
            cache.add_message(consistent(vec![m]).remove(0));
        }
        Op::Prepend(page) => {
            cache.prepend_messages(CONV, consistent(page));
        }
        Op::Delete(id) => {
            cache.delete_message(CONV, MessageId(id));
        }
    }
}

proptest! {
    /// Any sequence of mutations leaves the collection sorted and unique.
    #[test]
    fn collection_stays_sorted_and_unique(ops in prop::collection::vec(arb_op(), 0..40)) {
        let cache = MessageCache::new();
        for op in ops {
            run(&cache, op);
            prop_assert!(is_sorted_unique(&cache.messages(CONV)));
        }
    }

    /// Adding the same message twice equals adding it once.
    #[test]
    fn add_is_idempotent(seed in prop::collection::vec(arb_message(), 0..10), extra in arb_message()) {
        let once = MessageCache::new();
        let twice = MessageCache::new();
        once.set_messages(CONV, consistent(seed.clone()));
        twice.set_messages(CONV, consistent(seed));

        let extra = consistent(vec![extra]).remove(0);
        once.add_message(extra.clone());
        twice.add_message(extra.clone());
        twice.add_message(extra);

        prop_assert_eq!(once.messages(CONV), twice.messages(CONV));
    }

    /// Final ids do not depend on whether a page or a live push lands first.
    #[test]
    fn page_and_live_push_commute(
        page in prop::collection::vec(arb_message(), 0..10),
        live in prop::collection::vec(arb_message(), 0..5),
    ) {
        let page = consistent(page);
        let live = consistent(live);

        let page_first = MessageCache::new();
        page_first.prepend_messages(CONV, page.clone());
        for m in &live {
            page_first.add_message(m.clone());
        }

        let live_first = MessageCache::new();
        for m in &live {
            live_first.add_message(m.clone());
        }
        live_first.prepend_messages(CONV, page);

        prop_assert_eq!(page_first.message_ids(CONV), live_first.message_ids(CONV));
    }

    /// Soft delete never changes length or order.
    #[test]
    fn delete_preserves_positions(seed in prop::collection::vec(arb_message(), 1..20), pick in any::<prop::sample::Index>()) {
        let cache = MessageCache::new();
        cache.set_messages(CONV, consistent(seed));
        let before = cache.message_ids(CONV);
        let target = before[pick.index(before.len())];

        prop_assert!(cache.delete_message(CONV, target));
        prop_assert_eq!(cache.message_ids(CONV), before);
        prop_assert!(cache.message(target).is_some_and(|m| m.is_deleted));
    }
}
