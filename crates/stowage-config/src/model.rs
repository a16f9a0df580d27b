// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Stowage.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stowage_core::Plan;

/// Top-level Stowage configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StowageConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP listener and API tokens.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Billing webhook ingestion settings.
    #[serde(default)]
    pub billing: BillingConfig,

    /// Retry queue and sweeper settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Barcode lookup and provider settings.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name reported in logs and on the health endpoint.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "stowage".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for app-facing routes (status, barcode lookup).
    /// `None` rejects every request to those routes.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Bearer token for admin routes. `None` rejects every admin request.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_token: None,
            admin_token: None,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_token", &self.api_token.as_ref().map(|_| "[redacted]"))
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("stowage").join("stowage.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("stowage.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Billing webhook configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BillingConfig {
    /// Shared secret the billing provider sends with each webhook.
    /// `None` disables webhook authentication.
    #[serde(default)]
    pub webhook_token: Option<String>,

    /// Only events for this entitlement change subscription state.
    /// Events that name a different entitlement are ledgered and skipped.
    #[serde(default)]
    pub tracked_entitlement: Option<String>,

    /// Extra product id -> plan mappings, merged over the built-in catalog.
    #[serde(default)]
    pub plans: BTreeMap<String, Plan>,

    /// Auth failures tolerated per window before alerting.
    #[serde(default = "default_auth_failure_threshold")]
    pub auth_failure_threshold: u32,

    /// Other ingestion failures tolerated per window before alerting.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Width of the failure counting window in seconds.
    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            webhook_token: None,
            tracked_entitlement: None,
            plans: BTreeMap::new(),
            auth_failure_threshold: default_auth_failure_threshold(),
            failure_threshold: default_failure_threshold(),
            failure_window_secs: default_failure_window_secs(),
        }
    }
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field(
                "webhook_token",
                &self.webhook_token.as_ref().map(|_| "[redacted]"),
            )
            .field("tracked_entitlement", &self.tracked_entitlement)
            .field("plans", &self.plans)
            .field("auth_failure_threshold", &self.auth_failure_threshold)
            .field("failure_threshold", &self.failure_threshold)
            .field("failure_window_secs", &self.failure_window_secs)
            .finish()
    }
}

fn default_auth_failure_threshold() -> u32 {
    3
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_failure_window_secs() -> u64 {
    300 // 5 minutes
}

/// Retry queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Processing attempts before an event is dead-lettered.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    /// Run the in-process sweeper alongside `serve`.
    #[serde(default = "default_sweeper_enabled")]
    pub sweeper_enabled: bool,

    /// Seconds between sweeper passes.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Maximum due entries handled per pass.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            sweeper_enabled: default_sweeper_enabled(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_sweeper_enabled() -> bool {
    true
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_sweep_batch_size() -> u32 {
    50
}

/// Barcode lookup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LookupConfig {
    /// Days a cached product stays fresh.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u32,

    /// Per-request timeout for provider calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per provider before falling through the chain.
    #[serde(default = "default_lookup_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit between provider attempts, multiplied by the attempt number.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// User-Agent sent to providers (Open Food Facts asks for one).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub open_library: ProviderEndpointConfig,

    #[serde(default)]
    pub google_books: ProviderEndpointConfig,

    #[serde(default)]
    pub open_food_facts: ProviderEndpointConfig,

    #[serde(default)]
    pub upcitemdb: ProviderEndpointConfig,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            cache_ttl_days: default_cache_ttl_days(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_lookup_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            user_agent: default_user_agent(),
            open_library: ProviderEndpointConfig::default(),
            google_books: ProviderEndpointConfig::default(),
            open_food_facts: ProviderEndpointConfig::default(),
            upcitemdb: ProviderEndpointConfig::default(),
        }
    }
}

fn default_cache_ttl_days() -> u32 {
    30
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_lookup_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    750
}

fn default_user_agent() -> String {
    format!("stowage/{} (home inventory)", env!("CARGO_PKG_VERSION"))
}

/// Settings for one external product provider.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderEndpointConfig {
    /// Include this provider in the lookup chain.
    #[serde(default = "default_provider_enabled")]
    pub enabled: bool,

    /// Override the provider's public base URL (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key, for providers that accept or require one.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ProviderEndpointConfig {
    fn default() -> Self {
        Self {
            enabled: default_provider_enabled(),
            base_url: None,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for ProviderEndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEndpointConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

fn default_provider_enabled() -> bool {
    true
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default)]
    pub enabled: bool,
}
