use crate::domain::errors::MarketDataError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::KlineSource;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// 2024-01-01T00:00:00Z, a multiple of every supported timeframe
pub const MOCK_ANCHOR_MS: i64 = 1_704_067_200_000;

type Key = (String, Timeframe);

/// In-memory [`KlineSource`] scripted per (symbol, interval).
///
/// Returns the last `limit` scripted rows, counts every fetch and can be told
/// to fail or to sleep before answering.
#[derive(Default)]
pub struct MockKlineSource {
    rows: Mutex<HashMap<Key, Vec<Value>>>,
    failures: Mutex<HashMap<Key, MarketDataError>>,
    fetches: Mutex<HashMap<Key, usize>>,
    total: AtomicUsize,
    latency: Option<Duration>,
}

impl MockKlineSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every symbol gets 200 daily, 100 4h and 100 1h candles ending at
    /// [`MOCK_ANCHOR_MS`], each with its own oscillation.
    pub fn with_default_market(symbols: &[&str]) -> Self {
        let source = Self::new();
        for (seed, symbol) in symbols.iter().enumerate() {
            let base = base_price(symbol);
            for (timeframe, count) in [
                (Timeframe::OneDay, 200),
                (Timeframe::FourHour, 100),
                (Timeframe::OneHour, 100),
            ] {
                source.set_rows(
                    symbol,
                    timeframe,
                    generated_rows(timeframe, count, base, seed as u64 * 3 + 1),
                );
            }
        }
        source
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_rows(&self, symbol: &str, timeframe: Timeframe, rows: Vec<Value>) {
        lock(&self.rows).insert((symbol.to_string(), timeframe), rows);
    }

    pub fn fail_with(&self, symbol: &str, timeframe: Timeframe, error: MarketDataError) {
        lock(&self.failures).insert((symbol.to_string(), timeframe), error);
    }

    pub fn clear_failure(&self, symbol: &str, timeframe: Timeframe) {
        lock(&self.failures).remove(&(symbol.to_string(), timeframe));
    }

    pub fn fetch_count(&self, symbol: &str, timeframe: Timeframe) -> usize {
        lock(&self.fetches)
            .get(&(symbol.to_string(), timeframe))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl KlineSource for MockKlineSource {
    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        limit: usize,
        trace_id: &str,
    ) -> Result<Vec<Value>, MarketDataError> {
        let key = (symbol.to_string(), interval);
        *lock(&self.fetches).entry(key.clone()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);
        debug!(
            "MockKlineSource: fetch {} {} limit={} [trace_id={}]",
            symbol, interval, limit, trace_id
        );

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(err) = lock(&self.failures).get(&key) {
            return Err(err.clone());
        }

        let rows = lock(&self.rows);
        let rows = rows.get(&key).ok_or_else(|| MarketDataError::ApiResponse {
            status: 400,
            message: format!("Invalid symbol: {}", symbol),
        })?;
        Ok(rows[rows.len().saturating_sub(limit)..].to_vec())
    }
}

fn base_price(symbol: &str) -> Decimal {
    if symbol.starts_with("BTC") {
        dec!(42000)
    } else if symbol.starts_with("ETH") {
        dec!(2200)
    } else {
        dec!(100)
    }
}

/// One exchange-native kline row
pub fn kline_row(
    timestamp: i64,
    timeframe: Timeframe,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
) -> Value {
    json!([
        timestamp,
        open.to_string(),
        high.to_string(),
        low.to_string(),
        close.to_string(),
        volume.to_string(),
        timestamp + timeframe.to_millis() - 1,
        (close * volume).round_dp(8).to_string(),
        100,
        "0",
        "0",
        "0"
    ])
}

fn open_time(timeframe: Timeframe, count: usize, i: usize) -> i64 {
    MOCK_ANCHOR_MS - (count - i) as i64 * timeframe.to_millis()
}

/// Deterministic saw-tooth within +/-1% of `base`; `seed` shifts the phase.
pub fn generated_rows(timeframe: Timeframe, count: usize, base: Decimal, seed: u64) -> Vec<Value> {
    let mut prev_close = base;
    (0..count)
        .map(|i| {
            let step = ((i as u64 * 7 + seed) % 11) as i64 - 5;
            let close = (base * (Decimal::ONE + Decimal::from(step) / dec!(500))).round_dp(8);
            let open = prev_close;
            prev_close = close;
            let high = (open.max(close) * dec!(1.002)).round_dp(8);
            let low = (open.min(close) * dec!(0.998)).round_dp(8);
            let volume = Decimal::from(10 + (i as u64 * 3 + seed) % 7);
            kline_row(open_time(timeframe, count, i), timeframe, open, high, low, close, volume)
        })
        .collect()
}

/// Identical candles: open = high = low = close = `price`.
pub fn flat_rows(timeframe: Timeframe, count: usize, price: Decimal) -> Vec<Value> {
    (0..count)
        .map(|i| {
            kline_row(
                open_time(timeframe, count, i),
                timeframe,
                price,
                price,
                price,
                price,
                dec!(10),
            )
        })
        .collect()
}

/// Closes rising (or falling, for negative `step`) by `step` every candle.
pub fn trend_rows(timeframe: Timeframe, count: usize, start: Decimal, step: Decimal) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let open = start + step * Decimal::from(i);
            let close = open + step;
            kline_row(
                open_time(timeframe, count, i),
                timeframe,
                open,
                open.max(close),
                open.min(close),
                close,
                dec!(10),
            )
        })
        .collect()
}
