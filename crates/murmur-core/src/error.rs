// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Murmur sync client.

use thiserror::Error;

use crate::types::ConversationId;

/// The primary error type used across the capability traits and the sync core.
#[derive(Debug, Error)]
pub enum MurmurError {
    /// An operation that requires the live transport was attempted while disconnected.
    #[error("not connected to the realtime transport")]
    NotConnected,

    /// A single topic subscribe or resubscribe failed.
    #[error("subscription to conversation {conversation_id} failed: {message}")]
    SubscriptionFailure {
        conversation_id: ConversationId,
        message: String,
    },

    /// An inbound frame was not JSON or matched none of the accepted shapes.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A history page could not be loaded.
    #[error("history fetch for conversation {conversation_id} failed: {message}")]
    HistoryFetchFailure {
        conversation_id: ConversationId,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Publishing an outbound frame failed.
    #[error("publish to {destination} failed: {message}")]
    PublishFailure {
        destination: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport-level failures (socket, protocol, handshake).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// REST call failures other than history loads.
    #[error("http error: {message}")]
    Http {
        status: Option<u16>,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (missing credential, invalid URL).
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied an unusable argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MurmurError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error means the transport was unavailable.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_includes_conversation_id() {
        let err = MurmurError::SubscriptionFailure {
            conversation_id: ConversationId(42),
            message: "broker refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "subscription to conversation 42 failed: broker refused"
        );
    }

    #[test]
    fn history_failure_exposes_source() {
        let err = MurmurError::HistoryFetchFailure {
            conversation_id: ConversationId(7),
            message: "timed out".into(),
            source: Some(Box::new(std::io::Error::other("socket closed"))),
        };
        assert!(err.source().is_some());
        assert!(!err.is_not_connected());
        assert!(MurmurError::NotConnected.is_not_connected());
    }
}
