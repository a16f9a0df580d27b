// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind addresses, non-empty paths, and positive limits.

use crate::diagnostic::ConfigError;
use crate::model::{ProviderEndpointConfig, StowageConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing on the first one.
pub fn validate_config(config: &StowageConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    for (key, token) in [
        ("server.api_token", &config.server.api_token),
        ("server.admin_token", &config.server.admin_token),
        ("billing.webhook_token", &config.billing.webhook_token),
    ] {
        if token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            fail(format!("{key} must not be blank when set"));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.billing.auth_failure_threshold < 1 {
        fail("billing.auth_failure_threshold must be at least 1".to_string());
    }
    if config.billing.failure_threshold < 1 {
        fail("billing.failure_threshold must be at least 1".to_string());
    }
    if config.billing.failure_window_secs < 60 {
        fail(format!(
            "billing.failure_window_secs must be at least 60, got {}",
            config.billing.failure_window_secs
        ));
    }
    for product_id in config.billing.plans.keys() {
        if product_id.trim().is_empty() {
            fail("billing.plans keys must not be empty".to_string());
        }
    }

    if !(1..=20).contains(&config.retry.max_attempts) {
        fail(format!(
            "retry.max_attempts must be between 1 and 20, got {}",
            config.retry.max_attempts
        ));
    }
    if config.retry.sweep_interval_secs < 1 {
        fail("retry.sweep_interval_secs must be at least 1".to_string());
    }
    if config.retry.sweep_batch_size < 1 {
        fail("retry.sweep_batch_size must be at least 1".to_string());
    }

    let lookup = &config.lookup;
    if !(1..=3650).contains(&lookup.cache_ttl_days) {
        fail(format!(
            "lookup.cache_ttl_days must be between 1 and 3650, got {}",
            lookup.cache_ttl_days
        ));
    }
    if lookup.request_timeout_secs < 1 {
        fail("lookup.request_timeout_secs must be at least 1".to_string());
    }
    if !(1..=10).contains(&lookup.max_attempts) {
        fail(format!(
            "lookup.max_attempts must be between 1 and 10, got {}",
            lookup.max_attempts
        ));
    }
    for (name, provider) in [
        ("open_library", &lookup.open_library),
        ("google_books", &lookup.google_books),
        ("open_food_facts", &lookup.open_food_facts),
        ("upcitemdb", &lookup.upcitemdb),
    ] {
        if let Some(message) = check_provider(name, provider) {
            fail(message);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_provider(name: &str, provider: &ProviderEndpointConfig) -> Option<String> {
    let url = provider.base_url.as_deref()?;
    if url.starts_with("http://") || url.starts_with("https://") {
        None
    } else {
        Some(format!(
            "lookup.{name}.base_url `{url}` must start with http:// or https://"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = StowageConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = StowageConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn zero_thresholds_fail_validation() {
        let mut config = StowageConfig::default();
        config.billing.auth_failure_threshold = 0;
        config.billing.failure_threshold = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "auth_failure_threshold"));
        assert!(has_message(&errors, "billing.failure_threshold"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = StowageConfig::default();
        config.service.log_level = "loud".to_string();
        config.retry.max_attempts = 0;
        config.lookup.cache_ttl_days = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn cache_ttl_is_bounded() {
        let mut config = StowageConfig::default();
        config.lookup.cache_ttl_days = u32::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "lookup.cache_ttl_days"));

        config.lookup.cache_ttl_days = 3650;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn blank_token_fails_validation() {
        let mut config = StowageConfig::default();
        config.billing.webhook_token = Some("   ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "billing.webhook_token"));
    }

    #[test]
    fn provider_base_url_must_be_http() {
        let mut config = StowageConfig::default();
        config.lookup.upcitemdb.base_url = Some("ftp://upc.example".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "lookup.upcitemdb.base_url"));

        config.lookup.upcitemdb.base_url = Some("http://127.0.0.1:9000".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn invalid_host_fails_validation() {
        let mut config = StowageConfig::default();
        config.server.host = "not a host!".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "server.host"));
    }
}
