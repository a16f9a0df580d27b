// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./stowage.toml` > `~/.config/stowage/stowage.toml` > `/etc/stowage/stowage.toml`
//! with environment variable overrides via `STOWAGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::StowageConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/stowage/stowage.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "stowage.toml";

/// Env var prefix for overrides.
pub const ENV_PREFIX: &str = "STOWAGE_";

/// Nested tables first, so `lookup_upcitemdb_api_key` is not claimed by `lookup_`.
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("lookup_open_library_", "lookup.open_library."),
    ("lookup_google_books_", "lookup.google_books."),
    ("lookup_open_food_facts_", "lookup.open_food_facts."),
    ("lookup_upcitemdb_", "lookup.upcitemdb."),
    ("service_", "service."),
    ("server_", "server."),
    ("storage_", "storage."),
    ("billing_", "billing."),
    ("retry_", "retry."),
    ("lookup_", "lookup."),
    ("prometheus_", "prometheus."),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/stowage/stowage.toml` (system-wide)
/// 3. `~/.config/stowage/stowage.toml` (user XDG config)
/// 4. `./stowage.toml` (local directory)
/// 5. `STOWAGE_*` environment variables
pub fn load_config() -> Result<StowageConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<StowageConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StowageConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<StowageConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StowageConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(StowageConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/stowage/stowage.toml`, when the platform has a config dir.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("stowage").join(LOCAL_CONFIG_FILE))
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
///
/// Uses an explicit section table rather than `Env::split("_")`, since key
/// names contain underscores: `STOWAGE_BILLING_WEBHOOK_TOKEN` must become
/// `billing.webhook_token`, not `billing.webhook.token`.
pub fn map_env_key(key: &str) -> String {
    for (prefix, section) in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(prefix) {
            return format!("{section}{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("billing_webhook_token"), "billing.webhook_token");
        assert_eq!(map_env_key("server_api_token"), "server.api_token");
        assert_eq!(map_env_key("retry_max_attempts"), "retry.max_attempts");
        assert_eq!(map_env_key("prometheus_enabled"), "prometheus.enabled");
    }

    #[test]
    fn nested_provider_keys_map_before_lookup() {
        assert_eq!(
            map_env_key("lookup_upcitemdb_api_key"),
            "lookup.upcitemdb.api_key"
        );
        assert_eq!(
            map_env_key("lookup_open_food_facts_base_url"),
            "lookup.open_food_facts.base_url"
        );
        assert_eq!(map_env_key("lookup_cache_ttl_days"), "lookup.cache_ttl_days");
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "stowage.toml",
                r#"
[billing]
webhook_token = "from-file"

[lookup.upcitemdb]
enabled = false
"#,
            )?;
            jail.set_env("STOWAGE_BILLING_WEBHOOK_TOKEN", "from-env");
            jail.set_env("STOWAGE_LOOKUP_UPCITEMDB_API_KEY", "k-123");

            let config = load_config_from_path(Path::new("stowage.toml"))?;
            assert_eq!(config.billing.webhook_token.as_deref(), Some("from-env"));
            assert!(!config.lookup.upcitemdb.enabled);
            assert_eq!(config.lookup.upcitemdb.api_key.as_deref(), Some("k-123"));
            Ok(())
        });
    }
}
