// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives `StompTransport` against a scripted in-process broker.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use murmur_core::{ConnectOptions, Transport, TransportEvent};
use murmur_stomp::codec::{self, Command, Decoded, Frame};
use murmur_stomp::StompTransport;

const WAIT: Duration = Duration::from_secs(5);

fn options(heartbeat_incoming: Duration) -> ConnectOptions {
    ConnectOptions {
        headers: vec![("Authorization".into(), "Bearer t0k3n".into())],
        reconnect_delay: Duration::from_millis(50),
        heartbeat_incoming,
        heartbeat_outgoing: Duration::ZERO,
    }
}

async fn start() -> (TcpListener, StompTransport) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/websocket", listener.local_addr().unwrap());
    (listener, StompTransport::new(url))
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("client should dial")
        .unwrap();
    accept_async(stream).await.unwrap()
}

async fn read_frame(ws: &mut WebSocketStream<TcpStream>) -> Frame {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("frame should arrive")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = message
            && let Decoded::Frame(frame) = codec::decode(text.as_str()).unwrap()
        {
            return frame;
        }
    }
}

async fn write(ws: &mut WebSocketStream<TcpStream>, frame: Frame) {
    ws.send(Message::Text(codec::encode(&frame).into())).await.unwrap();
}

async fn handshake(ws: &mut WebSocketStream<TcpStream>, heart_beat: &str) -> Frame {
    let connect = read_frame(ws).await;
    let connected = Frame::new(Command::Connected)
        .header("version", "1.2")
        .header("heart-beat", heart_beat);
    write(ws, connected).await;
    connect
}

async fn next_event(rx: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("event should arrive")
        .expect("channel open")
}

#[tokio::test]
async fn connect_subscribe_receive_and_publish() {
    let (listener, transport) = start().await;
    let (tx, mut rx) = mpsc::channel(16);
    transport.activate(options(Duration::ZERO), tx).await.unwrap();

    let mut ws = accept(&listener).await;
    let connect = handshake(&mut ws, "0,0").await;
    assert_eq!(connect.command, Command::Connect);
    assert_eq!(connect.get("Authorization"), Some("Bearer t0k3n"));
    assert_eq!(connect.get("accept-version"), Some("1.2"));
    assert_eq!(connect.get("heart-beat"), Some("0,0"));
    assert!(connect.get("host").unwrap().starts_with("127.0.0.1:"));

    assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);
    assert!(transport.is_connected());

    let handle = transport.subscribe("/topic/conversations/42").await.unwrap();
    let subscribe = read_frame(&mut ws).await;
    assert_eq!(subscribe.command, Command::Subscribe);
    assert_eq!(subscribe.get("id"), Some(handle.id.as_str()));
    assert_eq!(subscribe.get("destination"), Some("/topic/conversations/42"));

    let message = Frame::new(Command::Message)
        .header("subscription", handle.id.as_str())
        .header("destination", "/topic/conversations/42")
        .header("message-id", "m-1")
        .body(r#"{"messageId":104}"#);
    write(&mut ws, message).await;
    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Frame {
            subscription_id: handle.id.clone(),
            topic: "/topic/conversations/42".into(),
            body: r#"{"messageId":104}"#.into(),
        }
    );

    transport
        .publish("/app/chat/42", r#"{"content":"hi"}"#.into())
        .await
        .unwrap();
    let send = read_frame(&mut ws).await;
    assert_eq!(send.command, Command::Send);
    assert_eq!(send.get("destination"), Some("/app/chat/42"));
    assert_eq!(send.body, r#"{"content":"hi"}"#);

    transport.unsubscribe(&handle).await.unwrap();
    let unsubscribe = read_frame(&mut ws).await;
    assert_eq!(unsubscribe.command, Command::Unsubscribe);
    assert_eq!(unsubscribe.get("id"), Some(handle.id.as_str()));

    transport.deactivate().await.unwrap();
    assert!(!transport.is_connected());
    assert_eq!(read_frame(&mut ws).await.command, Command::Disconnect);
}

#[tokio::test]
async fn redials_after_server_close() {
    let (listener, transport) = start().await;
    let (tx, mut rx) = mpsc::channel(16);
    transport.activate(options(Duration::ZERO), tx).await.unwrap();

    let mut first = accept(&listener).await;
    handshake(&mut first, "0,0").await;
    assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);

    first.close(None).await.unwrap();
    assert!(matches!(
        next_event(&mut rx).await,
        TransportEvent::Disconnected { .. }
    ));
    assert!(!transport.is_connected());
    assert!(
        transport
            .publish("/app/chat/1", "{}".into())
            .await
            .unwrap_err()
            .is_not_connected()
    );

    let mut second = accept(&listener).await;
    let connect = handshake(&mut second, "0,0").await;
    assert_eq!(connect.get("Authorization"), Some("Bearer t0k3n"));
    assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);
    assert!(transport.is_connected());

    transport.deactivate().await.unwrap();
}

#[tokio::test]
async fn rejected_handshake_reports_error_and_retries() {
    let (listener, transport) = start().await;
    let (tx, mut rx) = mpsc::channel(16);
    transport.activate(options(Duration::ZERO), tx).await.unwrap();

    let mut ws = accept(&listener).await;
    read_frame(&mut ws).await;
    write(
        &mut ws,
        Frame::new(Command::Error).header("message", "invalid token"),
    )
    .await;

    match next_event(&mut rx).await {
        TransportEvent::Error { message } => assert!(message.contains("invalid token")),
        other => panic!("expected an error event, got {other:?}"),
    }
    assert!(!transport.is_connected());

    let mut retry = accept(&listener).await;
    handshake(&mut retry, "0,0").await;
    assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);
    transport.deactivate().await.unwrap();
}

#[tokio::test]
async fn silent_server_trips_heartbeat_watchdog() {
    let (listener, transport) = start().await;
    let (tx, mut rx) = mpsc::channel(16);
    transport
        .activate(options(Duration::from_millis(100)), tx)
        .await
        .unwrap();

    let mut ws = accept(&listener).await;
    let connect = handshake(&mut ws, "100,0").await;
    assert_eq!(connect.get("heart-beat"), Some("0,100"));
    assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);

    match next_event(&mut rx).await {
        TransportEvent::Disconnected { reason } => assert!(reason.contains("no data")),
        other => panic!("expected a disconnect, got {other:?}"),
    }
    transport.deactivate().await.unwrap();
}

#[tokio::test]
async fn broker_error_after_connect_is_forwarded() {
    let (listener, transport) = start().await;
    let (tx, mut rx) = mpsc::channel(16);
    transport.activate(options(Duration::ZERO), tx).await.unwrap();

    let mut ws = accept(&listener).await;
    handshake(&mut ws, "0,0").await;
    assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);

    write(&mut ws, Frame::new(Command::Error).body("destination forbidden")).await;
    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Error {
            message: "destination forbidden".into()
        }
    );
    transport.deactivate().await.unwrap();
}
