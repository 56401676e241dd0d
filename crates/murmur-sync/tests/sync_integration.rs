// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the sync core against the in-memory mocks.

use murmur_config::CursorMode;
use murmur_core::types::{ContentType, ConversationId, HistoryRequest, Message, MessageId};
use murmur_core::{MurmurError, Transport};
use murmur_sync::{ConnectionState, PageOutcome};
use murmur_test_utils::SyncHarness;

const C42: ConversationId = ConversationId(42);

fn topic(id: i64) -> String {
    format!("/topic/conversations/{id}")
}

async fn seeded_42(page_size: u32) -> SyncHarness {
    let h = SyncHarness::builder()
        .with_cursor(CursorMode::Page, page_size)
        .build()
        .await
        .unwrap();
    h.history
        .set_messages(
            C42,
            vec![
                Message::text(99, 42, "y", 500),
                Message::text(100, 42, "z", 900),
                Message::text(101, 42, "a", 1000),
                Message::text(102, 42, "b", 2000),
                Message::text(103, 42, "c", 3000),
            ],
        )
        .await;
    h.connected().await.unwrap();
    h.client.subscribe(C42).await.unwrap();
    h.converged().await.unwrap();
    h
}

#[tokio::test]
async fn echo_twice_then_older_page() {
    let h = seeded_42(3).await;

    let outcome = h.client.load_initial(C42).await.unwrap();
    assert_eq!(
        outcome,
        PageOutcome::Loaded {
            added: 3,
            exhausted: false
        }
    );
    assert_eq!(h.ids(42), vec![101, 102, 103]);

    let echo = Message::text(104, 42, "d", 4000);
    h.deliver(&echo).await.unwrap();
    h.deliver(&echo).await.unwrap();
    assert_eq!(h.ids(42), vec![101, 102, 103, 104]);
    assert_eq!(h.cache.len(C42), 4);

    let outcome = h.client.load_more(C42).await.unwrap();
    assert_eq!(
        outcome,
        PageOutcome::Loaded {
            added: 2,
            exhausted: true
        }
    );
    assert_eq!(h.ids(42), vec![99, 100, 101, 102, 103, 104]);

    assert_eq!(h.client.load_more(C42).await.unwrap(), PageOutcome::Exhausted);
    assert_eq!(h.history.fetch_count(), 2);
}

#[tokio::test]
async fn reconnect_resubscribes_everything_but_the_failing_topic() {
    let h = SyncHarness::builder().build().await.unwrap();
    h.connected().await.unwrap();
    for id in [1, 2, 3] {
        h.client.subscribe(ConversationId(id)).await.unwrap();
    }
    h.converged().await.unwrap();

    h.transport.simulate_drop("network change").await;
    h.settle().await;
    assert_eq!(h.client.state(), ConnectionState::Connecting);
    assert!(h.client.registry().active().await.is_empty());

    h.transport.fail_subscribe(&topic(2)).await;
    h.transport.simulate_reconnect().await;
    let registry = h.client.registry().clone();
    h.wait_for(|| {
        let registry = registry.clone();
        async move { registry.active().await == vec![ConversationId(1), ConversationId(3)] }
    })
    .await
    .unwrap();
    assert_eq!(
        registry.desired().await,
        vec![ConversationId(1), ConversationId(2), ConversationId(3)]
    );

    // The next reconnect picks the straggler up.
    h.transport.clear_subscribe_failures().await;
    h.transport.simulate_drop("again").await;
    h.transport.simulate_reconnect().await;
    h.converged().await.unwrap();
    assert_eq!(registry.active().await.len(), 3);

    let mut live = h.transport.active_topics().await;
    live.sort();
    assert_eq!(live, vec![topic(1), topic(2), topic(3)]);
}

#[tokio::test]
async fn page_number_loads_terminate_after_ceil_n_over_k_fetches() {
    for (n, k) in [(7, 3), (6, 3), (1, 50), (100, 10)] {
        let h = SyncHarness::builder()
            .with_cursor(CursorMode::Page, k)
            .with_history(5, n)
            .build()
            .await
            .unwrap();
        let c = ConversationId(5);

        h.client.load_initial(c).await.unwrap();
        while h.client.load_more(c).await.unwrap() != PageOutcome::Exhausted {}

        let expected = (n as usize).div_ceil(k as usize);
        assert_eq!(h.history.fetch_count(), expected, "n={n} k={k}");
        assert_eq!(h.ids(5), (1..=n).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn before_id_loads_terminate() {
    // Short last page ends the walk on its own.
    let h = SyncHarness::builder()
        .with_cursor(CursorMode::BeforeId, 3)
        .with_history(5, 7)
        .build()
        .await
        .unwrap();
    let c = ConversationId(5);
    h.client.load_initial(c).await.unwrap();
    while h.client.load_more(c).await.unwrap() != PageOutcome::Exhausted {}
    assert_eq!(h.history.fetch_count(), 3);
    assert_eq!(h.ids(5), (1..=7).collect::<Vec<_>>());

    let requests = h.history.requests().await;
    assert_eq!(
        requests[1].1,
        HistoryRequest::Before {
            before_id: Some(MessageId(5)),
            limit: 3
        }
    );

    // An exact multiple needs the server's hasMore hint.
    let h = SyncHarness::builder()
        .with_cursor(CursorMode::BeforeId, 3)
        .with_has_more()
        .with_history(5, 6)
        .build()
        .await
        .unwrap();
    h.client.load_initial(c).await.unwrap();
    while h.client.load_more(c).await.unwrap() != PageOutcome::Exhausted {}
    assert_eq!(h.history.fetch_count(), 2);
}

#[tokio::test]
async fn empty_conversation_loads_cleanly() {
    let h = SyncHarness::builder().build().await.unwrap();
    let c = ConversationId(8);
    assert_eq!(
        h.client.load_initial(c).await.unwrap(),
        PageOutcome::Loaded {
            added: 0,
            exhausted: true
        }
    );
    assert!(h.cache.is_empty(c));
    assert_eq!(h.client.load_more(c).await.unwrap(), PageOutcome::Exhausted);
}

#[tokio::test]
async fn load_more_before_initial_performs_initial_load() {
    let h = SyncHarness::builder()
        .with_cursor(CursorMode::Page, 2)
        .with_history(5, 4)
        .build()
        .await
        .unwrap();
    let outcome = h.client.load_more(ConversationId(5)).await.unwrap();
    assert!(matches!(outcome, PageOutcome::Loaded { added: 2, .. }));
    assert_eq!(h.ids(5), vec![3, 4]);
}

#[tokio::test]
async fn failed_fetch_leaves_cache_and_cursor_untouched() {
    let h = SyncHarness::builder()
        .with_cursor(CursorMode::Page, 2)
        .with_history(5, 4)
        .build()
        .await
        .unwrap();
    let c = ConversationId(5);
    h.client.load_initial(c).await.unwrap();

    h.history.fail_next("503 from upstream").await;
    let err = h.client.load_more(c).await.unwrap_err();
    assert!(matches!(
        err,
        MurmurError::HistoryFetchFailure { conversation_id, .. } if conversation_id == c
    ));
    assert_eq!(h.ids(5), vec![3, 4]);

    h.client.load_more(c).await.unwrap();
    let requests = h.history.requests().await;
    assert_eq!(requests[1].1, requests[2].1);
    assert_eq!(h.ids(5), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn page_arriving_after_reset_is_discarded() {
    let h = SyncHarness::builder()
        .with_cursor(CursorMode::Page, 2)
        .with_history(5, 6)
        .build()
        .await
        .unwrap();
    let c = ConversationId(5);
    h.client.load_initial(c).await.unwrap();

    let gate = h.history.hold().await;
    let (outcome, ()) = tokio::join!(h.client.load_more(c), async {
        h.client.pagination().reset(c);
        gate.notify_one();
    });
    assert_eq!(outcome.unwrap(), PageOutcome::Discarded);
    assert!(h.cache.is_empty(c));
    assert!(!h.client.pagination().has_loaded(c));
}

#[tokio::test]
async fn send_requires_connection_and_dedupes_echo() {
    let h = SyncHarness::builder().unstarted().build().await.unwrap();
    let err = h
        .client
        .send(C42, "hello", ContentType::Text, None)
        .await
        .unwrap_err();
    assert!(err.is_not_connected());

    h.client.start().await.unwrap();
    h.connected().await.unwrap();
    h.client.subscribe(C42).await.unwrap();
    h.converged().await.unwrap();

    h.client
        .send(C42, "hello", ContentType::Text, None)
        .await
        .unwrap();
    assert!(h.cache.is_empty(C42), "canonical mode waits for the echo");

    let echo = Message::text(500, 42, "hello", 10_000);
    h.deliver(&echo).await.unwrap();
    h.deliver(&echo).await.unwrap();
    assert_eq!(h.ids(42), vec![500]);
}

#[tokio::test]
async fn optimistic_entry_is_replaced_by_confirmed_copy() {
    let h = SyncHarness::builder().optimistic().build().await.unwrap();
    h.connected().await.unwrap();
    h.client.subscribe(C42).await.unwrap();
    h.converged().await.unwrap();

    let receipt = h
        .client
        .send(C42, "hello", ContentType::Text, None)
        .await
        .unwrap();
    assert!(receipt.correlation_key.is_some());
    assert_eq!(h.cache.pending(C42).len(), 1);

    h.deliver(&Message::text(500, 42, "hello", 10_000)).await.unwrap();
    assert!(h.cache.pending(C42).is_empty());
    assert_eq!(h.ids(42), vec![500]);
}

#[tokio::test]
async fn malformed_frames_do_not_stop_the_loop() {
    let h = seeded_42(3).await;
    h.deliver_raw(&topic(42), "not json".into()).await.unwrap();
    h.deliver_raw(&topic(42), r#"{"success": false, "message": "nope"}"#.into())
        .await
        .unwrap();
    h.deliver(&Message::text(104, 42, "d", 4000)).await.unwrap();
    assert_eq!(h.ids(42), vec![104]);
}

#[tokio::test]
async fn envelope_events_update_the_cache() {
    let h = seeded_42(10).await;
    h.client.load_initial(C42).await.unwrap();

    let delete = r#"{"type": "message:delete", "payload": {"messageId": 102}, "timestamp": 1}"#;
    h.deliver_raw(&topic(42), delete.into()).await.unwrap();
    let deleted = h.cache.message(MessageId(102)).unwrap();
    assert!(deleted.is_deleted);
    assert_eq!(h.ids(42), vec![99, 100, 101, 102, 103]);

    let typing = r#"{"type": "user:typing", "payload": {"user_id": 3, "username": "lan"}, "timestamp": 7}"#;
    h.deliver_raw(&topic(42), typing.into()).await.unwrap();
    assert_eq!(h.cache.typing_users(C42).len(), 1);

    let stop = r#"{"type": "user:stop_typing", "payload": {"user_id": 3}, "timestamp": 8}"#;
    h.deliver_raw(&topic(42), stop.into()).await.unwrap();
    assert!(h.cache.typing_users(C42).is_empty());
}

#[tokio::test]
async fn disconnect_keeps_desired_and_connect_restores_it() {
    let h = SyncHarness::builder().build().await.unwrap();
    h.connected().await.unwrap();
    h.client.subscribe(C42).await.unwrap();
    h.converged().await.unwrap();

    h.client.disconnect().await.unwrap();
    assert!(!h.client.is_connected());
    assert!(!h.transport.is_connected());
    assert!(h.client.registry().active().await.is_empty());
    assert_eq!(h.client.registry().desired().await, vec![C42]);

    h.client.connect().await.unwrap();
    h.connected().await.unwrap();
    h.converged().await.unwrap();
    assert_eq!(h.transport.active_topics().await, vec![topic(42)]);
}

#[tokio::test]
async fn signed_out_client_does_not_connect() {
    let h = SyncHarness::builder().without_token().build().await.unwrap();
    h.settle().await;
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
    assert!(h.transport.activations().await.is_empty());

    // Subscribing records intent without failing.
    h.client.subscribe(C42).await.unwrap();
    assert_eq!(h.client.registry().desired().await, vec![C42]);
}

#[tokio::test]
async fn shutdown_stops_loop_and_disconnects() {
    let h = SyncHarness::builder().build().await.unwrap();
    h.connected().await.unwrap();
    h.client.shutdown().await.unwrap();
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
    assert_eq!(h.transport.deactivations(), 1);
    assert!(h.client.start().await.is_err());
}
