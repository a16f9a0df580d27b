// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for Stowage.
//!
//! Uses the metrics-rs facade with the Prometheus exporter.
//! Metrics are rendered as Prometheus text format via the `render()` method,
//! which is exposed through the gateway's /metrics endpoint.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use stowage_core::{AdapterType, HealthStatus, PluginAdapter, StowageError};

pub use recording::{
    record_dead_lettered, record_lookup, record_lookup_latency, record_provider_request,
    record_retry_resolved, record_retry_scheduled, record_webhook_event, record_webhook_failure,
    register_metrics, set_pending_retries,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and exposes a handle for rendering
/// metrics in Prometheus text format.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Create a new PrometheusAdapter.
    ///
    /// Installs the Prometheus recorder globally. Only one recorder can be
    /// installed per process. Returns an error if a recorder is already installed.
    pub fn new() -> Result<Self, StowageError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            StowageError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wrap an existing handle, e.g. from a locally built recorder.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Get a reference to the Prometheus handle for rendering.
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, StowageError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StowageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A local recorder avoids fighting over the process-global one.
    fn local_adapter() -> (metrics_exporter_prometheus::PrometheusRecorder, PrometheusAdapter) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let adapter = PrometheusAdapter::from_handle(recorder.handle());
        (recorder, adapter)
    }

    #[test]
    fn recorded_counters_render_with_labels() {
        let (recorder, adapter) = local_adapter();
        metrics::with_local_recorder(&recorder, || {
            record_webhook_event("applied");
            record_webhook_event("applied");
            record_webhook_event("duplicate");
            record_dead_lettered();
            record_lookup("upcitemdb", "found");
        });

        let text = adapter.render();
        assert!(text.contains(r#"stowage_webhook_events_total{outcome="applied"} 2"#));
        assert!(text.contains(r#"stowage_webhook_events_total{outcome="duplicate"} 1"#));
        assert!(text.contains("stowage_retry_dead_lettered_total 1"));
        assert!(text.contains(r#"source="upcitemdb""#));
    }

    #[test]
    fn gauge_reports_last_value() {
        let (recorder, adapter) = local_adapter();
        metrics::with_local_recorder(&recorder, || {
            set_pending_retries(4.0);
            set_pending_retries(2.0);
        });
        assert!(adapter.render().contains("stowage_retry_pending 2"));
    }

    #[tokio::test]
    async fn adapter_identity_and_health() {
        let (_recorder, adapter) = local_adapter();
        assert_eq!(adapter.name(), "prometheus");
        assert_eq!(adapter.adapter_type(), AdapterType::Observability);
        assert_eq!(adapter.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
