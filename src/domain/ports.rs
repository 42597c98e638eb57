use crate::domain::errors::MarketDataError;
use crate::domain::market::timeframe::Timeframe;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::error;

/// Exchange client the engine reads candles from.
///
/// Each returned row is the exchange-native kline array
/// `[open_time, open, high, low, close, volume, close_time, ...]`.
/// Transport, retries and rate limiting are the implementor's business;
/// failures must be reported as network-family [`MarketDataError`]s.
#[async_trait]
pub trait KlineSource: Send + Sync {
    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        limit: usize,
        trace_id: &str,
    ) -> Result<Vec<Value>, MarketDataError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEvent {
    Hit,
    Miss,
    Update,
}

impl CacheEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEvent::Hit => "hit",
            CacheEvent::Miss => "miss",
            CacheEvent::Update => "update",
        }
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured logging sink. Implementations are best-effort: they must not
/// block for long and their failures are contained by [`LogSink`].
pub trait MarketDataLogger: Send + Sync {
    fn operation_start(&self, operation: &str, context: &Value, trace_id: &str);
    fn operation_complete(&self, operation: &str, context: &Value, trace_id: &str);
    fn operation_error(&self, operation: &str, context: &Value, trace_id: &str);
    fn cache_event(&self, cache_name: &str, event: CacheEvent, context: &Value, trace_id: &str);
    fn calculation(&self, indicator: &str, symbol: &str, result: &str, trace_id: &str);
    fn validation_error(
        &self,
        field: &str,
        value: &str,
        expected: &str,
        message: &str,
        trace_id: &str,
    );
    fn fallback_usage(&self, operation: &str, reason: &str, fallback_value: &str, trace_id: &str);
}

/// Logger that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl MarketDataLogger for NoopLogger {
    fn operation_start(&self, _: &str, _: &Value, _: &str) {}
    fn operation_complete(&self, _: &str, _: &Value, _: &str) {}
    fn operation_error(&self, _: &str, _: &Value, _: &str) {}
    fn cache_event(&self, _: &str, _: CacheEvent, _: &Value, _: &str) {}
    fn calculation(&self, _: &str, _: &str, _: &str, _: &str) {}
    fn validation_error(&self, _: &str, _: &str, _: &str, _: &str, _: &str) {}
    fn fallback_usage(&self, _: &str, _: &str, _: &str, _: &str) {}
}

/// Optional logger whose panics never reach the caller.
#[derive(Clone, Default)]
pub struct LogSink {
    inner: Option<Arc<dyn MarketDataLogger>>,
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("attached", &self.inner.is_some())
            .finish()
    }
}

impl LogSink {
    pub fn new(logger: Option<Arc<dyn MarketDataLogger>>) -> Self {
        Self { inner: logger }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    fn emit<F>(&self, f: F)
    where
        F: FnOnce(&dyn MarketDataLogger),
    {
        if let Some(logger) = self.inner.as_deref() {
            if catch_unwind(AssertUnwindSafe(|| f(logger))).is_err() {
                error!("LogSink: logger panicked, event dropped");
            }
        }
    }

    pub fn operation_start(&self, operation: &str, context: &Value, trace_id: &str) {
        self.emit(|l| l.operation_start(operation, context, trace_id));
    }

    pub fn operation_complete(&self, operation: &str, context: &Value, trace_id: &str) {
        self.emit(|l| l.operation_complete(operation, context, trace_id));
    }

    pub fn operation_error(&self, operation: &str, context: &Value, trace_id: &str) {
        self.emit(|l| l.operation_error(operation, context, trace_id));
    }

    pub fn cache_event(&self, cache_name: &str, event: CacheEvent, context: &Value, trace_id: &str) {
        self.emit(|l| l.cache_event(cache_name, event, context, trace_id));
    }

    pub fn calculation(&self, indicator: &str, symbol: &str, result: &str, trace_id: &str) {
        self.emit(|l| l.calculation(indicator, symbol, result, trace_id));
    }

    pub fn validation_error(
        &self,
        field: &str,
        value: &str,
        expected: &str,
        message: &str,
        trace_id: &str,
    ) {
        self.emit(|l| l.validation_error(field, value, expected, message, trace_id));
    }

    pub fn fallback_usage(&self, operation: &str, reason: &str, fallback_value: &str, trace_id: &str) {
        self.emit(|l| l.fallback_usage(operation, reason, fallback_value, trace_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PanickingLogger {
        calls: AtomicUsize,
    }

    impl MarketDataLogger for PanickingLogger {
        fn operation_start(&self, _: &str, _: &Value, _: &str) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("log backend down");
        }
        fn operation_complete(&self, _: &str, _: &Value, _: &str) {}
        fn operation_error(&self, _: &str, _: &Value, _: &str) {}
        fn cache_event(&self, _: &str, _: CacheEvent, _: &Value, _: &str) {}
        fn calculation(&self, _: &str, _: &str, _: &str, _: &str) {}
        fn validation_error(&self, _: &str, _: &str, _: &str, _: &str, _: &str) {}
        fn fallback_usage(&self, _: &str, _: &str, _: &str, _: &str) {}
    }

    #[test]
    fn test_logger_panic_is_contained() {
        let logger = Arc::new(PanickingLogger {
            calls: AtomicUsize::new(0),
        });
        let sink = LogSink::new(Some(logger.clone()));

        sink.operation_start("get_market_data", &json!({"symbol": "BTCUSDT"}), "t-1");
        sink.operation_start("get_market_data", &json!({}), "t-2");

        assert_eq!(logger.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disabled_sink_is_silent() {
        let sink = LogSink::disabled();
        sink.cache_event("correlation", CacheEvent::Hit, &json!({}), "t-1");
        sink.calculation("rsi_14", "BTCUSDT", "50", "t-1");
    }
}
