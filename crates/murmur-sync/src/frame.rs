// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound frame decoding.
//!
//! The server has sent three body shapes over time: a bare message, a
//! `{success, data}` wrapper, and a typed `{type, payload, timestamp}`
//! envelope. All of them are normalized into [`InboundEvent`] here so
//! nothing downstream has to probe JSON.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use murmur_core::MurmurError;
use murmur_core::types::{ConversationId, Message, MessageId, Reaction, ReactionChange, TypingUser};

/// Why a frame body could not be decoded.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame body matches no known shape")]
    UnknownShape,

    #[error("server reported failure: {0}")]
    Rejected(String),

    #[error("invalid {event} payload: {source}")]
    Payload {
        event: String,
        source: serde_json::Error,
    },
}

impl From<FrameError> for MurmurError {
    fn from(e: FrameError) -> Self {
        MurmurError::MalformedFrame(e.to_string())
    }
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    MessageNew(Message),
    MessageUpdate(Message),
    MessageDelete {
        conversation_id: Option<ConversationId>,
        message_id: MessageId,
    },
    Reaction {
        message_id: MessageId,
        change: ReactionChange,
    },
    Typing {
        conversation_id: Option<ConversationId>,
        user: TypingUser,
    },
    StopTyping {
        conversation_id: Option<ConversationId>,
        user_id: i64,
    },
    /// A well-formed envelope of a type this client does not handle.
    Ignored { event_type: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrame {
    Envelope {
        #[serde(rename = "type")]
        event_type: String,
        payload: Value,
        #[serde(default)]
        timestamp: i64,
    },
    Wrapped {
        success: bool,
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    Bare(Box<Message>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletePayload {
    #[serde(alias = "message_id")]
    message_id: MessageId,
    #[serde(default, alias = "conversation_id")]
    conversation_id: Option<ConversationId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactionPayload {
    #[serde(alias = "message_id")]
    message_id: MessageId,
    #[serde(alias = "account_id", alias = "user_id")]
    account_id: i64,
    emoji: String,
    #[serde(default)]
    removed: bool,
    #[serde(default, alias = "reacted_at")]
    reacted_at: i64,
}

#[derive(Deserialize)]
struct TypingPayload {
    #[serde(default, alias = "conversationId")]
    conversation_id: Option<ConversationId>,
    #[serde(alias = "userId")]
    user_id: i64,
    #[serde(default)]
    username: String,
}

/// Decode a frame body into an [`InboundEvent`].
pub fn decode(body: &str) -> Result<InboundEvent, FrameError> {
    let raw: RawFrame =
        serde_json::from_str(body).map_err(|e| match serde_json::from_str::<Value>(body) {
            Ok(_) => FrameError::UnknownShape,
            Err(_) => FrameError::Json(e),
        })?;

    match raw {
        RawFrame::Bare(message) => Ok(InboundEvent::MessageNew(*message)),
        RawFrame::Wrapped {
            success: false,
            message,
            error,
            ..
        } => Err(FrameError::Rejected(
            error.or(message).unwrap_or_else(|| "unspecified".to_string()),
        )),
        RawFrame::Wrapped {
            success: true,
            data,
            ..
        } => {
            let data = data.ok_or(FrameError::UnknownShape)?;
            Ok(InboundEvent::MessageNew(payload("message", data)?))
        }
        RawFrame::Envelope {
            event_type,
            payload: body,
            timestamp,
        } => decode_envelope(event_type, body, timestamp),
    }
}

fn decode_envelope(event_type: String, body: Value, timestamp: i64) -> Result<InboundEvent, FrameError> {
    let event = match event_type.as_str() {
        "message:new" => InboundEvent::MessageNew(payload(&event_type, body)?),
        "message:update" => InboundEvent::MessageUpdate(payload(&event_type, body)?),
        "message:delete" => {
            let p: DeletePayload = payload(&event_type, body)?;
            InboundEvent::MessageDelete {
                conversation_id: p.conversation_id,
                message_id: p.message_id,
            }
        }
        "message:reaction" => {
            let p: ReactionPayload = payload(&event_type, body)?;
            let change = if p.removed {
                ReactionChange::Removed {
                    account_id: p.account_id,
                    emoji: p.emoji,
                }
            } else {
                ReactionChange::Added(Reaction {
                    account_id: p.account_id,
                    emoji: p.emoji,
                    reacted_at: p.reacted_at,
                })
            };
            InboundEvent::Reaction {
                message_id: p.message_id,
                change,
            }
        }
        "user:typing" => {
            let p: TypingPayload = payload(&event_type, body)?;
            InboundEvent::Typing {
                conversation_id: p.conversation_id,
                user: TypingUser {
                    user_id: p.user_id,
                    username: p.username,
                    timestamp,
                },
            }
        }
        "user:stop_typing" => {
            let p: TypingPayload = payload(&event_type, body)?;
            InboundEvent::StopTyping {
                conversation_id: p.conversation_id,
                user_id: p.user_id,
            }
        }
        _ => InboundEvent::Ignored { event_type },
    };
    Ok(event)
}

fn payload<T: serde::de::DeserializeOwned>(event: &str, body: Value) -> Result<T, FrameError> {
    serde_json::from_value(body).map_err(|source| FrameError::Payload {
        event: event.to_string(),
        source,
    })
}
