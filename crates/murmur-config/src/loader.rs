// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/murmur/murmur.toml`, `~/.config/murmur/murmur.toml`,
//! `./murmur.toml`, then `MURMUR_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::MurmurConfig;

/// Config sections, used to map `MURMUR_<SECTION>_<KEY>` onto `section.key`.
const SECTIONS: &[&str] = &["client", "server", "auth", "transport", "history", "send"];

/// Candidate config files, lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/murmur/murmur.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("murmur").join("murmur.toml"));
    }
    paths.push(PathBuf::from("murmur.toml"));
    paths
}

/// Build the Figment used for the standard lookup (exposed for diagnostics).
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(MurmurConfig::default()));
    for path in config_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<MurmurConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<MurmurConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MurmurConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MurmurConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MurmurConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider mapping only the leading section name to a dot,
/// so `MURMUR_AUTH_ACCESS_TOKEN` becomes `auth.access_token`.
fn env_provider() -> Env {
    Env::prefixed("MURMUR_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_leading_section_only() {
        assert_eq!(map_env_key("auth_access_token"), "auth.access_token");
        assert_eq!(map_env_key("history_page_size"), "history.page_size");
        assert_eq!(
            map_env_key("transport_reconnect_delay_ms"),
            "transport.reconnect_delay_ms"
        );
        assert_eq!(map_env_key("unknown_key"), "unknown_key");
    }

    #[test]
    fn env_keys_arrive_uppercase() {
        assert_eq!(map_env_key("AUTH_ACCESS_TOKEN"), "auth.access_token");
        assert_eq!(map_env_key("SEND_OPTIMISTIC"), "send.optimistic");
    }

    #[test]
    fn env_override_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "murmur.toml",
                r#"
[history]
page_size = 20
"#,
            )?;
            jail.set_env("MURMUR_HISTORY_PAGE_SIZE", "30");
            jail.set_env("MURMUR_AUTH_ACCESS_TOKEN", "tok");
            let config = load_config_from_path(Path::new("murmur.toml"))?;
            assert_eq!(config.history.page_size, 30);
            assert_eq!(config.auth.access_token.as_deref(), Some("tok"));
            Ok(())
        });
    }
}
