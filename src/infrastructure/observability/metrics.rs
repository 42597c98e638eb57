//! Prometheus metrics for the snapshot engine
//!
//! All metrics use the `market_snapshot_` prefix.

use prometheus::{CounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Operations by name and outcome (start/complete/error)
    pub operations_total: CounterVec,
    /// Cache hits, misses and updates per cache
    pub cache_events_total: CounterVec,
    /// Indicator results produced
    pub calculations_total: CounterVec,
    /// Validation failures per field
    pub validation_errors_total: CounterVec,
    /// Degraded sections / fallbacks per operation
    pub fallbacks_total: CounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let operations_total = CounterVec::new(
            Opts::new(
                "market_snapshot_operations_total",
                "Engine operations by name and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let cache_events_total = CounterVec::new(
            Opts::new(
                "market_snapshot_cache_events_total",
                "Cache events by cache and event type",
            ),
            &["cache", "event"],
        )?;
        registry.register(Box::new(cache_events_total.clone()))?;

        let calculations_total = CounterVec::new(
            Opts::new(
                "market_snapshot_calculations_total",
                "Indicator values computed",
            ),
            &["indicator"],
        )?;
        registry.register(Box::new(calculations_total.clone()))?;

        let validation_errors_total = CounterVec::new(
            Opts::new(
                "market_snapshot_validation_errors_total",
                "Validation failures by field",
            ),
            &["field"],
        )?;
        registry.register(Box::new(validation_errors_total.clone()))?;

        let fallbacks_total = CounterVec::new(
            Opts::new(
                "market_snapshot_fallbacks_total",
                "Fallback values used by operation",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(fallbacks_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            operations_total,
            cache_events_total,
            calculations_total,
            validation_errors_total,
            fallbacks_total,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_operation(&self, operation: &str, outcome: &str) {
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn inc_cache_event(&self, cache: &str, event: &str) {
        self.cache_events_total
            .with_label_values(&[cache, event])
            .inc();
    }

    pub fn inc_calculation(&self, indicator: &str) {
        self.calculations_total.with_label_values(&[indicator]).inc();
    }

    pub fn inc_validation_error(&self, field: &str) {
        self.validation_errors_total
            .with_label_values(&[field])
            .inc();
    }

    pub fn inc_fallback(&self, operation: &str) {
        self.fallbacks_total.with_label_values(&[operation]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_operation("get_market_data", "start");
        assert!(metrics.render().contains("market_snapshot_"));
    }

    #[test]
    fn test_cache_event_counter() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_cache_event("btc_correlation", "miss");
        metrics.inc_cache_event("btc_correlation", "hit");
        metrics.inc_cache_event("btc_correlation", "hit");
        let output = metrics.render();
        assert!(output.contains(
            r#"market_snapshot_cache_events_total{cache="btc_correlation",event="hit"} 2"#
        ));
    }
}
