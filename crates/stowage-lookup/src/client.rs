// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HTTP client for product providers.
//!
//! Provides [`ProviderClient`] which applies the per-request timeout and
//! retries transient failures (transport errors, timeouts, 429, 5xx) with
//! linear backoff.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use stowage_config::model::LookupConfig;
use stowage_core::StowageError;
use tracing::{debug, warn};

/// HTTP client shared by every provider in a chain.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
}

impl ProviderClient {
    /// Builds a client from lookup settings.
    pub fn from_config(config: &LookupConfig) -> Result<Self, StowageError> {
        Self::new(
            &config.user_agent,
            Duration::from_secs(config.request_timeout_secs),
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
        )
    }

    pub fn new(
        user_agent: &str,
        timeout: Duration,
        max_attempts: u32,
        backoff_base: Duration,
    ) -> Result<Self, StowageError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| {
                StowageError::Config(format!("invalid user agent header value: {e}"))
            })?,
        );
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StowageError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            timeout,
            max_attempts: max_attempts.max(1),
            backoff_base,
        })
    }

    /// Fetch JSON from `url`.
    ///
    /// Returns `Ok(None)` for 404 and other non-retryable 4xx responses,
    /// which providers treat as a definitive miss.
    pub async fn get_json(
        &self,
        provider: &str,
        url: reqwest::Url,
        headers: &[(&'static str, String)],
    ) -> Result<Option<serde_json::Value>, StowageError> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = self.backoff_base * (attempt - 1);
                warn!(provider, attempt, delay_ms = delay.as_millis() as u64, "retrying provider request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.get(url.clone()).timeout(self.timeout);
            for (name, value) in headers {
                request = request.header(*name, value);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(provider, attempt, error = %e, "provider request failed");
                    last_error = Some(if e.is_timeout() {
                        StowageError::Timeout {
                            duration: self.timeout,
                        }
                    } else {
                        StowageError::Provider {
                            message: format!("{provider} request failed: {e}"),
                            source: Some(Box::new(e)),
                        }
                    });
                    continue;
                }
            };

            let status = response.status();
            debug!(provider, status = %status, attempt, "provider response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| StowageError::Provider {
                    message: format!("failed to read {provider} response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                let value = serde_json::from_str(&body).map_err(|e| StowageError::Provider {
                    message: format!("failed to parse {provider} response: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return Ok(Some(value));
            }

            if is_transient_error(status) {
                let body = response.text().await.unwrap_or_default();
                warn!(provider, status = %status, body = %truncate(&body, 200), "transient provider error");
                last_error = Some(StowageError::Provider {
                    message: format!("{provider} returned {status}"),
                    source: None,
                });
                continue;
            }

            debug!(provider, status = %status, "provider has no record");
            return Ok(None);
        }

        Err(last_error.unwrap_or_else(|| StowageError::Provider {
            message: format!("{provider} request failed after retries"),
            source: None,
        }))
    }
}

/// Returns true for HTTP status codes worth another attempt.
fn is_transient_error(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
