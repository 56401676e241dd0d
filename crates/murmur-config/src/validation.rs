// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: URL schemes, non-zero
//! intervals, page size bounds. All failures are collected before returning.

use crate::diagnostic::ConfigError;
use crate::model::MurmurConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest page the history endpoint will serve.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &MurmurConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.client.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(invalid(
            "client.log_level",
            format!(
                "`{}` is not one of {}",
                config.client.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    check_scheme(
        &mut errors,
        "server.api_base_url",
        &config.server.api_base_url,
        &["http://", "https://"],
    );
    check_scheme(
        &mut errors,
        "server.ws_url",
        &config.server.ws_url,
        &["ws://", "wss://"],
    );

    if config.server.api_base_url.ends_with('/') {
        errors.push(invalid(
            "server.api_base_url",
            "must not end with `/`".to_string(),
        ));
    }

    if let Some(token) = &config.auth.access_token
        && token.trim().is_empty()
    {
        errors.push(invalid(
            "auth.access_token",
            "must not be blank; omit it instead".to_string(),
        ));
    }

    if config.transport.reconnect_delay_ms == 0 {
        errors.push(invalid(
            "transport.reconnect_delay_ms",
            "must be greater than 0".to_string(),
        ));
    }

    for (key, prefix) in [
        ("transport.topic_prefix", &config.transport.topic_prefix),
        ("transport.send_prefix", &config.transport.send_prefix),
    ] {
        if !prefix.starts_with('/') {
            errors.push(invalid(key, format!("`{prefix}` must start with `/`")));
        }
    }

    if config.transport.event_buffer == 0 {
        errors.push(invalid(
            "transport.event_buffer",
            "must be greater than 0".to_string(),
        ));
    }

    if config.history.page_size == 0 || config.history.page_size > MAX_PAGE_SIZE {
        errors.push(invalid(
            "history.page_size",
            format!(
                "must be between 1 and {MAX_PAGE_SIZE}, got {}",
                config.history.page_size
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_scheme(errors: &mut Vec<ConfigError>, key: &str, value: &str, schemes: &[&str]) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(invalid(key, "must not be empty".to_string()));
    } else if !schemes.iter().any(|s| value.starts_with(s)) {
        errors.push(invalid(
            key,
            format!("`{value}` must start with one of {}", schemes.join(", ")),
        ));
    }
}

fn invalid(key: &str, message: String) -> ConfigError {
    ConfigError::Validation {
        key: key.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error_for(errors: &[ConfigError], wanted: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { key, .. } if key == wanted))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&MurmurConfig::default()).is_ok());
    }

    #[test]
    fn http_ws_url_fails_validation() {
        let mut config = MurmurConfig::default();
        config.server.ws_url = "http://localhost:8080/ws".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "server.ws_url"));
    }

    #[test]
    fn zero_page_size_fails_validation() {
        let mut config = MurmurConfig::default();
        config.history.page_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "history.page_size"));
    }

    #[test]
    fn errors_are_collected_not_fail_fast() {
        let mut config = MurmurConfig::default();
        config.client.log_level = "loud".into();
        config.transport.reconnect_delay_ms = 0;
        config.transport.topic_prefix = "topic".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn blank_token_fails_validation() {
        let mut config = MurmurConfig::default();
        config.auth.access_token = Some("  ".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error_for(&errors, "auth.access_token"));
    }
}
