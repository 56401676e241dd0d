// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations.

use chrono::{DateTime, Local};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use murmur_cache::CacheEvent;
use murmur_config::MurmurConfig;
use murmur_core::types::Message;
use murmur_core::{ContentType, ConversationId, MessageId, MurmurError};
use murmur_sync::PageOutcome;

use crate::runtime;

/// Subscribe to conversations and print changes until interrupted.
pub async fn tail(config: &MurmurConfig, conversations: &[i64]) -> Result<(), MurmurError> {
    let shutdown = runtime::install_signal_handler()?;
    let client = runtime::connect(config).await?;
    let cache = client.cache().clone();
    let mut events = cache.subscribe();

    for id in conversations {
        client.subscribe(ConversationId(*id)).await?;
    }
    info!(conversations = conversations.len(), "tailing");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Ok(CacheEvent::MessageAdded { message_id, .. }) => {
                    if let Some(message) = cache.message(message_id) {
                        println!("{}", format_message(&message));
                    }
                }
                Ok(CacheEvent::MessageUpdated { message_id, .. }) => {
                    if let Some(message) = cache.message(message_id) {
                        println!("{} (edited)", format_message(&message));
                    }
                }
                Ok(CacheEvent::MessageDeleted { conversation_id, message_id }) => {
                    println!("[{conversation_id}] #{message_id} deleted");
                }
                Ok(CacheEvent::TypingChanged { conversation_id }) => {
                    let names: Vec<String> = cache
                        .typing_users(conversation_id)
                        .into_iter()
                        .map(|u| u.username)
                        .collect();
                    if !names.is_empty() {
                        eprintln!("[{conversation_id}] {} typing...", names.join(", "));
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "cache event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.shutdown().await
}

/// Print a conversation's newest page plus up to `pages` older ones.
pub async fn history(config: &MurmurConfig, conversation: i64, pages: u32) -> Result<(), MurmurError> {
    if config.auth.access_token.is_none() {
        warn!("no access token configured; the server will likely refuse the request");
    }
    let client = runtime::build_client(config)?;
    let conversation_id = ConversationId(conversation);

    let mut outcome = client.load_initial(conversation_id).await?;
    for _ in 0..pages {
        if matches!(outcome, PageOutcome::Exhausted | PageOutcome::Loaded { exhausted: true, .. }) {
            break;
        }
        outcome = client.load_more(conversation_id).await?;
    }

    for message in client.cache().messages(conversation_id) {
        println!("{}", format_message(&message));
    }
    if client.pagination().is_exhausted(conversation_id) {
        eprintln!("(start of conversation)");
    }
    Ok(())
}

/// Publish one message.
pub async fn send(
    config: &MurmurConfig,
    conversation: i64,
    content: &str,
    content_type: ContentType,
    reply_to: Option<i64>,
) -> Result<(), MurmurError> {
    let client = runtime::connect(config).await?;
    let result = client
        .send(
            ConversationId(conversation),
            content,
            content_type,
            reply_to.map(MessageId),
        )
        .await;
    let shutdown = client.shutdown().await;

    let receipt = result?;
    println!("sent to {}", receipt.destination);
    shutdown
}

/// Print the effective configuration as TOML, token masked.
pub fn show_config(config: &MurmurConfig) -> Result<(), MurmurError> {
    print!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &MurmurConfig) -> Result<String, MurmurError> {
    let mut shown = config.clone();
    if shown.auth.access_token.is_some() {
        shown.auth.access_token = Some("********".to_string());
    }
    toml::to_string_pretty(&shown).map_err(|e| MurmurError::Internal(format!("failed to render config: {e}")))
}

/// One line per message: `[conversation] #id time sender: content`.
fn format_message(message: &Message) -> String {
    let time = DateTime::from_timestamp_millis(message.created_at)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| message.created_at.to_string());
    let sender = message
        .sender
        .as_ref()
        .map(|p| {
            if p.display_name.is_empty() {
                p.username.clone()
            } else {
                p.display_name.clone()
            }
        })
        .unwrap_or_else(|| "?".to_string());
    let body = if message.is_deleted {
        "(deleted)".to_string()
    } else {
        message.content.clone().unwrap_or_default()
    };
    format!(
        "[{}] #{} {time} {sender}: {body}",
        message.conversation_id, message.message_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::types::Profile;

    #[test]
    fn formats_sender_and_deleted_body() {
        let mut message = Message::text(104, 42, "hi there", 0);
        message.sender = Some(Profile {
            account_id: 7,
            username: "an".into(),
            display_name: String::new(),
            avatar_url: None,
            status: None,
        });
        let line = format_message(&message);
        assert!(line.starts_with("[42] #104 "));
        assert!(line.ends_with("an: hi there"));

        message.soft_delete();
        assert!(format_message(&message).ends_with("an: (deleted)"));
    }

    #[test]
    fn config_dump_masks_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("murmur.toml");
        std::fs::write(&path, "[auth]\naccess_token = \"secret\"\naccount_id = 7\n").unwrap();

        let config = murmur_config::load_and_validate_path(&path).unwrap();
        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("********"));
        assert!(rendered.contains("account_id = 7"));
    }
}
