use crate::domain::ports::{CacheEvent, MarketDataLogger};
use crate::infrastructure::observability::metrics::Metrics;
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// [`MarketDataLogger`] that writes structured `tracing` events, optionally
/// counting them in Prometheus.
#[derive(Clone, Default)]
pub struct TracingLogger {
    metrics: Option<Metrics>,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: Metrics) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }
}

impl MarketDataLogger for TracingLogger {
    fn operation_start(&self, operation: &str, context: &Value, trace_id: &str) {
        info!(trace_id, operation, %context, "operation started");
        if let Some(m) = &self.metrics {
            m.inc_operation(operation, "start");
        }
    }

    fn operation_complete(&self, operation: &str, context: &Value, trace_id: &str) {
        info!(trace_id, operation, %context, "operation completed");
        if let Some(m) = &self.metrics {
            m.inc_operation(operation, "complete");
        }
    }

    fn operation_error(&self, operation: &str, context: &Value, trace_id: &str) {
        error!(trace_id, operation, %context, "operation failed");
        if let Some(m) = &self.metrics {
            m.inc_operation(operation, "error");
        }
    }

    fn cache_event(&self, cache_name: &str, event: CacheEvent, context: &Value, trace_id: &str) {
        debug!(trace_id, cache = cache_name, event = event.as_str(), %context, "cache event");
        if let Some(m) = &self.metrics {
            m.inc_cache_event(cache_name, event.as_str());
        }
    }

    fn calculation(&self, indicator: &str, symbol: &str, result: &str, trace_id: &str) {
        debug!(trace_id, indicator, symbol, result, "indicator calculated");
        if let Some(m) = &self.metrics {
            m.inc_calculation(indicator);
        }
    }

    fn validation_error(
        &self,
        field: &str,
        value: &str,
        expected: &str,
        message: &str,
        trace_id: &str,
    ) {
        warn!(trace_id, field, value, expected, message, "validation failed");
        if let Some(m) = &self.metrics {
            m.inc_validation_error(field);
        }
    }

    fn fallback_usage(&self, operation: &str, reason: &str, fallback_value: &str, trace_id: &str) {
        warn!(trace_id, operation, reason, fallback_value, "fallback used");
        if let Some(m) = &self.metrics {
            m.inc_fallback(operation);
        }
    }
}
