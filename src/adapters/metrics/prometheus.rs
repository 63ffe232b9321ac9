//! Prometheus Metrics Registry - Aggregation Observability
//!
//! Registers the per-provider fetch outcome counters and latency
//! histograms plus invocation-level counters. The text exposition is
//! served from `/metrics` on the main HTTP listener.

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::domain::ProviderId;

/// Centralized Prometheus metrics for the aggregator.
///
/// All metrics follow the naming convention `grid_aggregator_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Provider task outcomes.
    pub provider_fetches: IntCounterVec,
    /// Provider task wall-clock duration (seconds).
    pub provider_fetch_seconds: HistogramVec,
    /// Aggregation invocations by status (`ok`, `unavailable`).
    pub invocations: IntCounterVec,
    /// Responses that needed the reduced-payload fallback.
    pub serialization_fallbacks: IntCounter,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let provider_fetches = IntCounterVec::new(
            Opts::new(
                "grid_aggregator_provider_fetch_total",
                "Provider task outcomes",
            ),
            &["provider", "outcome"],
        )?;

        let provider_fetch_seconds = HistogramVec::new(
            HistogramOpts::new(
                "grid_aggregator_provider_fetch_seconds",
                "Provider task duration in seconds",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0]),
            &["provider"],
        )?;

        let invocations = IntCounterVec::new(
            Opts::new(
                "grid_aggregator_invocations_total",
                "Aggregation invocations by response status",
            ),
            &["status"],
        )?;

        let serialization_fallbacks = IntCounter::new(
            "grid_aggregator_serialization_fallbacks_total",
            "Responses served through the reduced-payload fallback",
        )?;

        registry.register(Box::new(provider_fetches.clone()))?;
        registry.register(Box::new(provider_fetch_seconds.clone()))?;
        registry.register(Box::new(invocations.clone()))?;
        registry.register(Box::new(serialization_fallbacks.clone()))?;

        Ok(Self {
            registry,
            provider_fetches,
            provider_fetch_seconds,
            invocations,
            serialization_fallbacks,
        })
    }

    /// Record one provider task.
    pub fn record_provider(&self, provider: ProviderId, outcome: &str, elapsed: Duration) {
        self.provider_fetches
            .with_label_values(&[provider.as_str(), outcome])
            .inc();
        self.provider_fetch_seconds
            .with_label_values(&[provider.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Record one aggregation invocation.
    pub fn record_invocation(&self, status: &str) {
        self.invocations.with_label_values(&[status]).inc();
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record_provider(ProviderId::Caiso, "complete", Duration::from_millis(120));
        metrics.record_invocation("ok");
        metrics.serialization_fallbacks.inc();

        let text = metrics.render();
        assert!(text.contains(
            r#"grid_aggregator_provider_fetch_total{outcome="complete",provider="caiso"} 1"#
        ));
        assert!(text.contains(r#"grid_aggregator_invocations_total{status="ok"} 1"#));
        assert!(text.contains("grid_aggregator_serialization_fallbacks_total 1"));
    }
}
