use crate::application::market_data::candle_table_builder::CandleTableBuilder;
use crate::domain::config::analysis_config::CorrelationConfig;
use crate::domain::errors::MarketDataError;
use crate::domain::market::candle::CandleTable;
use crate::domain::ports::{CacheEvent, KlineSource, LogSink};
use crate::domain::validation::data_quality::CrossFieldValidator;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

pub const CORRELATION_CACHE_NAME: &str = "btc_correlation";

/// Reference-asset table and the moment it was fetched
#[derive(Debug, Clone)]
pub struct CorrelationCacheEntry {
    pub table: Arc<CandleTable>,
    pub fetched_at: Instant,
}

/// TTL cache of the reference asset's candles plus the correlation against it.
///
/// The whole "check age -> fetch if stale -> store" sequence runs under one
/// async mutex, so concurrent callers queue behind an in-flight refresh and
/// at most one fetch happens per TTL window.
pub struct CorrelationCache {
    source: Arc<dyn KlineSource>,
    validator: CrossFieldValidator,
    config: CorrelationConfig,
    log: LogSink,
    entry: Mutex<Option<CorrelationCacheEntry>>,
}

impl std::fmt::Debug for CorrelationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationCache")
            .field("reference_symbol", &self.config.reference_symbol)
            .field("ttl", &self.config.ttl)
            .field("entry", &"<Mutex>")
            .finish()
    }
}

impl CorrelationCache {
    pub fn new(
        source: Arc<dyn KlineSource>,
        validator: CrossFieldValidator,
        config: CorrelationConfig,
        log: LogSink,
    ) -> Self {
        Self {
            source,
            validator,
            config,
            log,
            entry: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Returns the cached reference table, refreshing it first when missing
    /// or older than the TTL. A failed refresh leaves the old entry in place.
    pub async fn reference_table(&self, trace_id: &str) -> Result<Arc<CandleTable>, MarketDataError> {
        let mut guard = self.entry.lock().await;

        if let Some(entry) = guard.as_ref() {
            let age = entry.fetched_at.elapsed();
            if age < self.config.ttl {
                debug!(
                    "CorrelationCache: Hit for {} (age {}ms)",
                    self.config.reference_symbol,
                    age.as_millis()
                );
                self.log.cache_event(
                    CORRELATION_CACHE_NAME,
                    CacheEvent::Hit,
                    &json!({
                        "symbol": self.config.reference_symbol,
                        "age_ms": age.as_millis() as u64,
                    }),
                    trace_id,
                );
                return Ok(entry.table.clone());
            }
        }

        self.log.cache_event(
            CORRELATION_CACHE_NAME,
            CacheEvent::Miss,
            &json!({
                "symbol": self.config.reference_symbol,
                "cached": guard.is_some(),
            }),
            trace_id,
        );

        let rows = self
            .source
            .fetch_klines(
                &self.config.reference_symbol,
                self.config.timeframe,
                self.config.fetch_limit,
                trace_id,
            )
            .await?;
        let table = CandleTableBuilder::build(
            &self.config.reference_symbol,
            self.config.timeframe,
            &rows,
        )?;
        self.validator.validate(&table)?;

        let table = Arc::new(table);
        *guard = Some(CorrelationCacheEntry {
            table: table.clone(),
            fetched_at: Instant::now(),
        });

        info!(
            "CorrelationCache: Refreshed {} {} ({} candles)",
            self.config.reference_symbol,
            self.config.timeframe,
            table.len()
        );
        self.log.cache_event(
            CORRELATION_CACHE_NAME,
            CacheEvent::Update,
            &json!({
                "symbol": self.config.reference_symbol,
                "candles": table.len(),
            }),
            trace_id,
        );

        Ok(table)
    }

    /// Pearson correlation of percentage returns between `primary` and the
    /// reference asset over the configured window.
    pub async fn correlation(
        &self,
        primary: &CandleTable,
        trace_id: &str,
    ) -> Result<Decimal, MarketDataError> {
        let reference = self.reference_table(trace_id).await?;
        let (x, y) = aligned_returns(primary, &reference, self.config.window);

        if x.len() < self.config.min_periods {
            return Err(MarketDataError::insufficient(
                CORRELATION_CACHE_NAME,
                self.config.min_periods,
                x.len(),
            ));
        }

        pearson(&x, &y)
    }

    pub async fn is_fresh(&self) -> bool {
        match self.entry.lock().await.as_ref() {
            Some(entry) => entry.fetched_at.elapsed() < self.config.ttl,
            None => false,
        }
    }

    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}

/// Percentage returns of both tables over their shared open timestamps,
/// limited to the most recent `window` periods. Only consecutive candles
/// produce a return; a gap in either table drops the pair that spans it.
pub fn aligned_returns(
    primary: &CandleTable,
    reference: &CandleTable,
    window: usize,
) -> (Vec<Decimal>, Vec<Decimal>) {
    let interval = primary.timeframe().to_millis();
    let reference_closes: HashMap<i64, Decimal> = reference
        .candles()
        .iter()
        .map(|c| (c.timestamp, c.close))
        .collect();

    let pairs: Vec<(i64, Decimal, Decimal)> = primary
        .candles()
        .iter()
        .filter_map(|c| {
            reference_closes
                .get(&c.timestamp)
                .map(|r| (c.timestamp, c.close, *r))
        })
        .collect();
    let pairs = &pairs[pairs.len().saturating_sub(window + 1)..];

    pairs
        .windows(2)
        .filter(|w| w[1].0 - w[0].0 == interval)
        .filter(|w| !w[0].1.is_zero() && !w[0].2.is_zero())
        .map(|w| ((w[1].1 - w[0].1) / w[0].1, (w[1].2 - w[0].2) / w[0].2))
        .unzip()
}

pub fn pearson(x: &[Decimal], y: &[Decimal]) -> Result<Decimal, MarketDataError> {
    let len = x.len().min(y.len());
    if len < 2 {
        return Err(MarketDataError::insufficient(CORRELATION_CACHE_NAME, 2, len));
    }
    let (x, y) = (&x[..len], &y[..len]);

    let n = Decimal::from(len);
    let mean_x = x.iter().sum::<Decimal>() / n;
    let mean_y = y.iter().sum::<Decimal>() / n;

    let mut cov = Decimal::ZERO;
    let mut var_x = Decimal::ZERO;
    let mut var_y = Decimal::ZERO;
    for (a, b) in x.iter().zip(y) {
        let dx = *a - mean_x;
        let dy = *b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x.is_zero() || var_y.is_zero() {
        return Err(MarketDataError::calculation(
            CORRELATION_CACHE_NAME,
            "zero variance in return series",
        ));
    }

    let denom = match (var_x.sqrt(), var_y.sqrt()) {
        (Some(sx), Some(sy)) if !(sx * sy).is_zero() => sx * sy,
        _ => {
            return Err(MarketDataError::calculation(
                CORRELATION_CACHE_NAME,
                "variance too small to normalise",
            ));
        }
    };

    Ok((cov / denom).clamp(Decimal::NEGATIVE_ONE, Decimal::ONE))
}
