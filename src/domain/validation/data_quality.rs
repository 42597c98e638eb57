use crate::domain::config::analysis_config::ValidationConfig;
use crate::domain::errors::MarketDataError;
use crate::domain::market::candle::{Candle, CandleTable};
use rust_decimal::Decimal;
use tracing::warn;

/// Cross-field checks on a built [`CandleTable`].
///
/// Rejects tables that are physically impossible or too suspect to feed into
/// indicators (e.g. a single corrupted print far away from its neighbours).
/// The first failing check wins; nothing downstream runs on a rejected table.
#[derive(Debug, Clone, Default)]
pub struct CrossFieldValidator {
    config: ValidationConfig,
}

impl CrossFieldValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, table: &CandleTable) -> Result<(), MarketDataError> {
        let name = format!("{} {}", table.symbol(), table.timeframe().table_name());

        let required = self.config.min_candles(table.timeframe());
        if table.len() < required {
            return Err(self.fail(
                &name,
                "min_rows",
                table.len(),
                format!("at least {} rows", required),
            ));
        }

        let interval = table.timeframe().to_millis();
        let mut prev_ts: Option<i64> = None;
        for (row, candle) in table.candles().iter().enumerate() {
            if let Some(prev) = prev_ts {
                if candle.timestamp == prev {
                    return Err(self.fail(
                        &name,
                        "duplicate_timestamp",
                        format!("row {} timestamp {}", row, candle.timestamp),
                        "unique timestamps",
                    ));
                }
                if candle.timestamp < prev {
                    return Err(self.fail(
                        &name,
                        "monotonic_timestamp",
                        format!("row {} timestamp {} after {}", row, candle.timestamp, prev),
                        "strictly increasing timestamps",
                    ));
                }
                // gaps are allowed, off-grid opens are not
                if (candle.timestamp - prev) % interval != 0 {
                    return Err(self.fail(
                        &name,
                        "timestamp_spacing",
                        format!("row {} is {}ms after row {}", row, candle.timestamp - prev, row - 1),
                        format!("a multiple of {}ms", interval),
                    ));
                }
            }
            prev_ts = Some(candle.timestamp);

            self.check_bounds(&name, row, candle)?;
            self.check_ohlc(&name, row, candle)?;
        }

        self.check_volatility(&name, table.candles())
    }

    fn check_bounds(&self, name: &str, row: usize, candle: &Candle) -> Result<(), MarketDataError> {
        let prices = [
            ("open", candle.open),
            ("high", candle.high),
            ("low", candle.low),
            ("close", candle.close),
        ];
        for (field, price) in prices {
            if price <= self.config.min_price {
                return Err(self.fail(
                    name,
                    "min_magnitude",
                    format!("row {} {} = {}", row, field, price),
                    format!("{} > {}", field, self.config.min_price),
                ));
            }
            if price > self.config.max_price {
                return Err(self.fail(
                    name,
                    "max_magnitude",
                    format!("row {} {} = {}", row, field, price),
                    format!("{} <= {}", field, self.config.max_price),
                ));
            }
        }

        if candle.volume < Decimal::ZERO || candle.volume > self.config.max_volume {
            return Err(self.fail(
                name,
                "volume_bounds",
                format!("row {} volume = {}", row, candle.volume),
                format!("0 <= volume <= {}", self.config.max_volume),
            ));
        }

        Ok(())
    }

    fn check_ohlc(&self, name: &str, row: usize, candle: &Candle) -> Result<(), MarketDataError> {
        let body_top = candle.open.max(candle.close);
        let body_bottom = candle.open.min(candle.close);

        if candle.high < body_top || body_bottom < candle.low {
            return Err(self.fail(
                name,
                "ohlc_order",
                format!(
                    "row {} o={} h={} l={} c={}",
                    row, candle.open, candle.high, candle.low, candle.close
                ),
                "high >= max(open, close) >= min(open, close) >= low",
            ));
        }
        Ok(())
    }

    /// Compares every close against a MA of `volatility_window` closes: the
    /// trailing window ending on the row, or the first full window for rows
    /// that precede it.
    fn check_volatility(&self, name: &str, candles: &[Candle]) -> Result<(), MarketDataError> {
        let window = self.config.volatility_window;
        if window == 0 || candles.len() < window {
            return Ok(());
        }

        let divisor = Decimal::from(window);
        let mut sum: Decimal = candles[..window].iter().map(|c| c.close).sum();
        let first_mean = sum / divisor;

        for (i, candle) in candles.iter().enumerate() {
            if i >= window {
                sum += candle.close - candles[i - window].close;
            }
            let mean = if i < window { first_mean } else { sum / divisor };
            if mean <= Decimal::ZERO {
                continue;
            }

            let deviation = (candle.close - mean).abs() / mean;
            if deviation > self.config.volatility_guard_pct {
                return Err(self.fail(
                    name,
                    "volatility_guard",
                    format!(
                        "row {} close {} deviates {:.4} from MA{} {:.8}",
                        i, candle.close, deviation, window, mean
                    ),
                    format!("deviation <= {}", self.config.volatility_guard_pct),
                ));
            }
        }
        Ok(())
    }

    fn fail(
        &self,
        table: &str,
        check: &str,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> MarketDataError {
        let err = MarketDataError::table(table, check, value, expected);
        warn!("CrossFieldValidator: {}", err);
        err
    }
}
