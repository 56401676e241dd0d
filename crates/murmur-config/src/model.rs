// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Murmur sync client.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a mistyped key is
//! reported at startup instead of being silently ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Murmur configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MurmurConfig {
    /// Process-level settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Server endpoints.
    #[serde(default)]
    pub server: ServerConfig,

    /// Credentials.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Realtime transport policy and topic naming.
    #[serde(default)]
    pub transport: TransportConfig,

    /// History pagination.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Outbound send behavior.
    #[serde(default)]
    pub send: SendConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Server endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base URL of the REST API, without a trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// WebSocket endpoint speaking STOMP.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ws_url: default_ws_url(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8080/ws/websocket".to_string()
}

/// Credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Bearer access token. `None` means not signed in.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Account id of the signed-in user, used for local reaction updates.
    #[serde(default)]
    pub account_id: Option<i64>,
}

/// Realtime transport policy and topic naming.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Fixed delay between reconnect attempts, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Expected server heartbeat interval, in milliseconds. 0 disables.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_incoming_ms: u64,

    /// Client heartbeat interval, in milliseconds. 0 disables.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_outgoing_ms: u64,

    /// Prefix of per-conversation broadcast topics.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Prefix of per-conversation send destinations.
    #[serde(default = "default_send_prefix")]
    pub send_prefix: String,

    /// Capacity of the transport event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl TransportConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn heartbeat_incoming(&self) -> Duration {
        Duration::from_millis(self.heartbeat_incoming_ms)
    }

    pub fn heartbeat_outgoing(&self) -> Duration {
        Duration::from_millis(self.heartbeat_outgoing_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            heartbeat_incoming_ms: default_heartbeat_ms(),
            heartbeat_outgoing_ms: default_heartbeat_ms(),
            topic_prefix: default_topic_prefix(),
            send_prefix: default_send_prefix(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_heartbeat_ms() -> u64 {
    4000
}

fn default_topic_prefix() -> String {
    "/topic/conversations/".to_string()
}

fn default_send_prefix() -> String {
    "/app/chat/".to_string()
}

fn default_event_buffer() -> usize {
    256
}

/// Which cursor form the history endpoint understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorMode {
    /// `page` / `size` query parameters.
    #[default]
    Page,
    /// `beforeMessageId` / `limit` query parameters.
    BeforeId,
}

/// History pagination.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Cursor strategy.
    #[serde(default)]
    pub cursor: CursorMode,

    /// Messages per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cursor: CursorMode::default(),
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    50
}

/// Outbound send behavior.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SendConfig {
    /// Insert a pending entry after publishing, replaced when the echo arrives.
    #[serde(default)]
    pub optimistic: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_conventions() {
        let config = MurmurConfig::default();
        assert_eq!(config.transport.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.transport.heartbeat_incoming(), Duration::from_secs(4));
        assert_eq!(config.transport.topic_prefix, "/topic/conversations/");
        assert_eq!(config.transport.send_prefix, "/app/chat/");
        assert_eq!(config.history.cursor, CursorMode::Page);
        assert_eq!(config.history.page_size, 50);
        assert!(!config.send.optimistic);
        assert!(config.auth.access_token.is_none());
    }

    #[test]
    fn cursor_mode_parses_snake_case() {
        let config: MurmurConfig = toml::from_str(
            r#"
[history]
cursor = "before_id"
page_size = 25
"#,
        )
        .unwrap();
        assert_eq!(config.history.cursor, CursorMode::BeforeId);
        assert_eq!(config.history.page_size, 25);
    }

    #[test]
    fn unknown_section_is_rejected() {
        let result = toml::from_str::<MurmurConfig>("[telemetry]\nenabled = true\n");
        assert!(result.is_err());
    }
}
