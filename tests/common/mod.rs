#![allow(dead_code)]

use market_snapshot::domain::market::timeframe::Timeframe;
use market_snapshot::domain::ports::{CacheEvent, MarketDataLogger};
use market_snapshot::infrastructure::mock::{MockKlineSource, generated_rows};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::sync::Mutex;

/// Logger that keeps `kind:name` strings for assertions
#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl MarketDataLogger for RecordingLogger {
    fn operation_start(&self, operation: &str, _: &Value, _: &str) {
        self.push(format!("start:{}", operation));
    }
    fn operation_complete(&self, operation: &str, _: &Value, _: &str) {
        self.push(format!("complete:{}", operation));
    }
    fn operation_error(&self, operation: &str, _: &Value, _: &str) {
        self.push(format!("error:{}", operation));
    }
    fn cache_event(&self, cache_name: &str, event: CacheEvent, _: &Value, _: &str) {
        self.push(format!("cache:{}:{}", cache_name, event));
    }
    fn calculation(&self, indicator: &str, _: &str, _: &str, _: &str) {
        self.push(format!("calc:{}", indicator));
    }
    fn validation_error(&self, field: &str, _: &str, _: &str, _: &str, _: &str) {
        self.push(format!("invalid:{}", field));
    }
    fn fallback_usage(&self, operation: &str, _: &str, _: &str, _: &str) {
        self.push(format!("fallback:{}", operation));
    }
}

/// Logger that panics on every call
pub struct PanickingLogger;

impl MarketDataLogger for PanickingLogger {
    fn operation_start(&self, _: &str, _: &Value, _: &str) {
        panic!("operation_start");
    }
    fn operation_complete(&self, _: &str, _: &Value, _: &str) {
        panic!("operation_complete");
    }
    fn operation_error(&self, _: &str, _: &Value, _: &str) {
        panic!("operation_error");
    }
    fn cache_event(&self, _: &str, _: CacheEvent, _: &Value, _: &str) {
        panic!("cache_event");
    }
    fn calculation(&self, _: &str, _: &str, _: &str, _: &str) {
        panic!("calculation");
    }
    fn validation_error(&self, _: &str, _: &str, _: &str, _: &str, _: &str) {
        panic!("validation_error");
    }
    fn fallback_usage(&self, _: &str, _: &str, _: &str, _: &str) {
        panic!("fallback_usage");
    }
}

pub fn market() -> MockKlineSource {
    MockKlineSource::with_default_market(&["ETHUSDT", "BTCUSDT"])
}

/// Moves every open/close time by `offset_ms`.
pub fn shifted(mut rows: Vec<Value>, offset_ms: i64) -> Vec<Value> {
    for row in rows.iter_mut() {
        for idx in [0, 6] {
            let ts = row[idx].as_i64().unwrap();
            row[idx] = json!(ts + offset_ms);
        }
    }
    rows
}

/// 100 hourly BTC rows overlapping the default ETH table on only `overlap` timestamps
pub fn btc_hourly_overlapping(overlap: usize) -> Vec<Value> {
    let rows = generated_rows(Timeframe::OneHour, 100, dec!(42000), 4);
    shifted(rows, (100 - overlap) as i64 * Timeframe::OneHour.to_millis())
}
