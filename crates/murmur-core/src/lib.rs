// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Murmur realtime sync client.
//!
//! This crate provides the shared data model (messages, conversations,
//! history pages), the error taxonomy, and the capability traits that the
//! sync core consumes: the pub/sub transport, the history API, the mutation
//! API, and the credential source. Concrete implementations live in
//! `murmur-stomp` and `murmur-http`.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MurmurError;
pub use types::{ContentType, ConversationId, ConversationType, Message, MessageId};

pub use traits::{
    ConnectOptions, CredentialProvider, HistoryApi, MutationApi, StaticCredentials,
    SubscriptionHandle, Transport, TransportEvent,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn murmur_error_has_all_variants() {
        let _not_connected = MurmurError::NotConnected;
        let _subscription = MurmurError::SubscriptionFailure {
            conversation_id: ConversationId(1),
            message: "test".into(),
        };
        let _malformed = MurmurError::MalformedFrame("test".into());
        let _history = MurmurError::HistoryFetchFailure {
            conversation_id: ConversationId(1),
            message: "test".into(),
            source: None,
        };
        let _publish = MurmurError::PublishFailure {
            destination: "/app/chat/1".into(),
            message: "test".into(),
            source: None,
        };
        let _transport = MurmurError::Transport {
            message: "test".into(),
            source: Some(Box::new(std::io::Error::other("test"))),
        };
        let _http = MurmurError::Http {
            status: Some(500),
            message: "test".into(),
            source: None,
        };
        let _config = MurmurError::Config("test".into());
        let _input = MurmurError::InvalidInput("test".into());
        let _internal = MurmurError::Internal("test".into());
    }

    #[test]
    fn content_type_round_trips_through_strum() {
        use std::str::FromStr;

        for variant in [
            ContentType::Text,
            ContentType::Markdown,
            ContentType::Code,
            ContentType::System,
        ] {
            let s = variant.to_string();
            assert_eq!(ContentType::from_str(&s).expect("should parse back"), variant);
        }
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _transport(_: &dyn Transport) {}
        fn _history(_: &dyn HistoryApi) {}
        fn _mutation(_: &dyn MutationApi) {}
        fn _credentials(_: &dyn CredentialProvider) {}
    }
}
