// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! STOMP over WebSocket implementation of [`Transport`].
//!
//! A single connection task owns the socket. Callers talk to it through a
//! command channel and get a oneshot reply once their frame is written.
//! When the link drops the task waits `reconnect_delay` and dials again
//! until the transport is deactivated; every successful handshake is
//! reported as [`TransportEvent::Connected`] so the owner can resubscribe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use murmur_core::{ConnectOptions, MurmurError, SubscriptionHandle, Transport, TransportEvent};

use crate::codec::{self, Command, Decoded, Frame};
use crate::error::StompError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// How long a caller waits for the connection task to write its frame.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the broker has to answer CONNECT.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A frame queued for the connection task.
struct Outbound {
    frame: Frame,
    reply: oneshot::Sender<Result<(), StompError>>,
}

/// Handles for a running connection task.
struct Active {
    cancel: CancellationToken,
    commands: mpsc::Sender<Outbound>,
    task: JoinHandle<()>,
}

/// STOMP 1.2 client over a WebSocket endpoint.
pub struct StompTransport {
    url: String,
    connected: Arc<AtomicBool>,
    next_subscription: AtomicU64,
    active: Mutex<Option<Active>>,
}

impl StompTransport {
    /// Create a transport for a `ws://` or `wss://` endpoint. Nothing is
    /// dialed until [`Transport::activate`].
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connected: Arc::new(AtomicBool::new(false)),
            next_subscription: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), StompError> {
        if !self.is_connected() {
            return Err(StompError::NotConnected);
        }
        let commands = match self.active.lock().await.as_ref() {
            Some(active) => active.commands.clone(),
            None => return Err(StompError::NotConnected),
        };

        let command = frame.command;
        let (reply, rx) = oneshot::channel();
        commands
            .send(Outbound { frame, reply })
            .await
            .map_err(|_| StompError::Closed("connection task stopped".into()))?;

        tokio::time::timeout(COMMAND_TIMEOUT, rx)
            .await
            .map_err(|_| StompError::Closed(format!("{command} not written within {COMMAND_TIMEOUT:?}")))?
            .map_err(|_| StompError::Closed("reply dropped".into()))?
    }

    async fn stop(&self) {
        let previous = self.active.lock().await.take();
        if let Some(active) = previous {
            active.cancel.cancel();
            if let Err(e) = active.task.await {
                warn!(error = %e, "stomp connection task panicked");
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for StompTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StompTransport")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for StompTransport {
    fn name(&self) -> &str {
        "stomp"
    }

    async fn activate(
        &self,
        options: ConnectOptions,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), MurmurError> {
        // A second activation replaces the first, picking up fresh headers.
        self.stop().await;

        let (commands, commands_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let session = Session {
            url: self.url.clone(),
            host: host_of(&self.url),
            options,
            events,
            connected: self.connected.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(session.run(commands_rx));

        *self.active.lock().await = Some(Active {
            cancel,
            commands,
            task,
        });
        debug!(url = %self.url, "stomp transport activated");
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), MurmurError> {
        self.stop().await;
        debug!(url = %self.url, "stomp transport deactivated");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, topic: &str) -> Result<SubscriptionHandle, MurmurError> {
        let id = format!("sub-{}", self.next_subscription.fetch_add(1, Ordering::SeqCst));
        let frame = Frame::new(Command::Subscribe)
            .header("id", id.as_str())
            .header("destination", topic)
            .header("ack", "auto");
        self.send_frame(frame).await?;
        Ok(SubscriptionHandle {
            id,
            topic: topic.to_string(),
        })
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), MurmurError> {
        let frame = Frame::new(Command::Unsubscribe).header("id", handle.id.as_str());
        Ok(self.send_frame(frame).await?)
    }

    async fn publish(&self, destination: &str, body: String) -> Result<(), MurmurError> {
        let frame = Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .body(body);
        Ok(self.send_frame(frame).await?)
    }
}

/// Everything the connection task needs for its lifetime.
struct Session {
    url: String,
    host: String,
    options: ConnectOptions,
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Session {
    async fn run(self, mut commands: mpsc::Receiver<Outbound>) {
        loop {
            let outcome = self.connect_once(&mut commands).await;
            let was_connected = self.connected.swap(false, Ordering::SeqCst);

            match outcome {
                Ok(()) => break,
                Err(e) if was_connected => {
                    warn!(url = %self.url, error = %e, "stomp connection lost");
                    self.emit(TransportEvent::Disconnected {
                        reason: e.to_string(),
                    })
                    .await;
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "stomp connect attempt failed");
                    self.emit(TransportEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                }
            }

            if !self.backoff(&mut commands).await {
                break;
            }
            debug!(url = %self.url, "reconnecting");
        }
        debug!(url = %self.url, "stomp connection task exiting");
    }

    /// Sleep for the reconnect delay, refusing commands meanwhile. Returns
    /// `false` when cancelled.
    async fn backoff(&self, commands: &mut mpsc::Receiver<Outbound>) -> bool {
        let sleep = tokio::time::sleep(self.options.reconnect_delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = &mut sleep => return true,
                Some(outbound) = commands.recv() => {
                    let _ = outbound.reply.send(Err(StompError::NotConnected));
                }
            }
        }
    }

    /// Dial, handshake, and pump frames until the link fails. `Ok` means
    /// the session ended on purpose.
    async fn connect_once(&self, commands: &mut mpsc::Receiver<Outbound>) -> Result<(), StompError> {
        let ws = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = connect_async(self.url.as_str()) => result?.0,
        };
        let (mut sink, mut source) = ws.split();

        let mut connect = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", self.host.as_str())
            .header(
                "heart-beat",
                codec::heartbeat_header(self.options.heartbeat_outgoing, self.options.heartbeat_incoming),
            );
        for (name, value) in &self.options.headers {
            connect = connect.header(name.as_str(), value.as_str());
        }
        send_text(&mut sink, codec::encode(&connect)).await?;

        let connected = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = tokio::time::timeout(HANDSHAKE_TIMEOUT, await_connected(&mut source)) => {
                result.map_err(|_| StompError::Protocol(format!("no CONNECTED within {HANDSHAKE_TIMEOUT:?}")))??
            }
        };

        let heartbeat = codec::negotiate_heartbeat(
            self.options.heartbeat_outgoing,
            self.options.heartbeat_incoming,
            connected.get("heart-beat"),
        );
        info!(
            url = %self.url,
            version = connected.get("version").unwrap_or("1.2"),
            send_every = ?heartbeat.send_every,
            expect_every = ?heartbeat.expect_every,
            "stomp connected"
        );
        self.connected.store(true, Ordering::SeqCst);
        self.emit(TransportEvent::Connected).await;

        let mut pulse = heartbeat.send_every.map(ticker);
        let mut watchdog = heartbeat.expect_every.map(ticker);
        // Tolerate one missed server heartbeat.
        let silence_limit = heartbeat.expect_every.map(|d| d * 2).unwrap_or(Duration::MAX);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = send_text(&mut sink, codec::encode(&Frame::new(Command::Disconnect))).await;
                    let _ = sink.close().await;
                    return Ok(());
                }
                outbound = commands.recv() => {
                    let Some(Outbound { frame, reply }) = outbound else {
                        return Ok(());
                    };
                    if let Err(e) = send_text(&mut sink, codec::encode(&frame)).await {
                        let _ = reply.send(Err(StompError::Closed(e.to_string())));
                        return Err(e);
                    }
                    let _ = reply.send(Ok(()));
                }
                incoming = source.next() => {
                    last_seen = Instant::now();
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => self.handle_text(text.as_str()).await,
                        Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                            Ok(text) => self.handle_text(text).await,
                            Err(_) => warn!("dropping non-UTF-8 binary frame"),
                        },
                        Some(Ok(WsMessage::Close(close))) => {
                            let reason = close
                                .map(|c| c.reason.as_str().to_string())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "closed by server".to_string());
                            return Err(StompError::Closed(reason));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(StompError::Closed("stream ended".into())),
                    }
                }
                _ = tick(&mut pulse) => {
                    send_text(&mut sink, "\n".to_string()).await?;
                }
                _ = tick(&mut watchdog) => {
                    if last_seen.elapsed() > silence_limit {
                        return Err(StompError::HeartbeatTimeout(silence_limit));
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        let frame = match codec::decode(text) {
            Ok(Decoded::Heartbeat) => return,
            Ok(Decoded::Frame(frame)) => frame,
            Err(e) => {
                warn!(error = %e, "undecodable stomp frame");
                self.emit(TransportEvent::Error {
                    message: e.to_string(),
                })
                .await;
                return;
            }
        };

        match frame.command {
            Command::Message => {
                let event = TransportEvent::Frame {
                    subscription_id: frame.get("subscription").unwrap_or_default().to_string(),
                    topic: frame.get("destination").unwrap_or_default().to_string(),
                    body: frame.body,
                };
                self.emit(event).await;
            }
            Command::Error => {
                let message = frame
                    .get("message")
                    .map(str::to_string)
                    .unwrap_or_else(|| frame.body.clone());
                warn!(%message, "broker sent ERROR");
                self.emit(TransportEvent::Error { message }).await;
            }
            other => debug!(command = %other, "ignoring stomp frame"),
        }
    }

    async fn emit(&self, event: TransportEvent) {
        if self.events.send(event).await.is_err() {
            debug!("transport event receiver dropped");
        }
    }
}

async fn send_text(sink: &mut WsSink, text: String) -> Result<(), StompError> {
    sink.send(WsMessage::Text(text.into())).await?;
    Ok(())
}

/// Read until the broker answers CONNECT.
async fn await_connected(source: &mut WsSource) -> Result<Frame, StompError> {
    while let Some(message) = source.next().await {
        let text = match message? {
            WsMessage::Text(text) => text.as_str().to_string(),
            WsMessage::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            WsMessage::Close(_) => break,
            _ => continue,
        };
        match codec::decode(&text)? {
            Decoded::Heartbeat => continue,
            Decoded::Frame(frame) if frame.command == Command::Connected => return Ok(frame),
            Decoded::Frame(frame) if frame.command == Command::Error => {
                let message = frame.get("message").map(str::to_string).unwrap_or(frame.body);
                return Err(StompError::Broker(message));
            }
            Decoded::Frame(frame) => {
                return Err(StompError::Protocol(format!(
                    "expected CONNECTED, got {}",
                    frame.command
                )));
            }
        }
    }
    Err(StompError::Closed("closed during handshake".into()))
}

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Authority part of a WebSocket URL, used as the STOMP `host` header.
fn host_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?']).next().unwrap_or(rest).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_url_authority() {
        assert_eq!(host_of("ws://localhost:8080/ws/websocket"), "localhost:8080");
        assert_eq!(host_of("wss://chat.example.com?x=1"), "chat.example.com");
        assert_eq!(host_of("localhost"), "localhost");
    }

    #[tokio::test]
    async fn commands_fail_fast_before_activation() {
        let transport = StompTransport::new("ws://127.0.0.1:9/ws");
        assert!(!transport.is_connected());
        let err = transport.publish("/app/chat/1", "{}".into()).await.unwrap_err();
        assert!(err.is_not_connected());
        assert!(transport.subscribe("/topic/conversations/1").await.unwrap_err().is_not_connected());
        transport.deactivate().await.unwrap();
    }
}
