// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors raised inside the STOMP transport.

use murmur_core::MurmurError;
use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum StompError {
    /// Frame could not be parsed or violated the protocol.
    #[error("stomp protocol error: {0}")]
    Protocol(String),

    /// The broker answered with an ERROR frame.
    #[error("broker error: {0}")]
    Broker(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The socket closed or the connection task went away.
    #[error("connection closed: {0}")]
    Closed(String),

    /// The server stopped sending heartbeats.
    #[error("no data from server for {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    /// No live connection to issue the command on.
    #[error("not connected")]
    NotConnected,
}

impl From<StompError> for MurmurError {
    fn from(err: StompError) -> Self {
        match err {
            StompError::NotConnected => MurmurError::NotConnected,
            other => MurmurError::Transport {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_maps_to_core_variant() {
        assert!(MurmurError::from(StompError::NotConnected).is_not_connected());
        let err = MurmurError::from(StompError::Closed("eof".into()));
        assert!(matches!(err, MurmurError::Transport { .. }));
        assert!(err.to_string().contains("eof"));
    }
}
