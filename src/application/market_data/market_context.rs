//! Text summary of a [`MarketDataSet`] for the decision prompt.
//!
//! Works purely from the snapshot; no network access. Each section is built
//! independently and a failing one is replaced by an "analysis failed" line.

use crate::application::market_data::pattern_recognizer::{CandleShape, PatternRecognizer};
use crate::domain::errors::MarketDataError;
use crate::domain::market::snapshot::MarketDataSet;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::LogSink;
use rust_decimal::Decimal;
use std::fmt::Write as _;
use tracing::warn;

pub const ANALYSIS_FAILED: &str = "analysis failed";

type Section = fn(&MarketContextReporter, &MarketDataSet) -> Result<String, MarketDataError>;

pub struct MarketContextReporter {
    log: LogSink,
    trend_lookback: usize,
}

impl MarketContextReporter {
    pub fn new(log: LogSink, trend_lookback: usize) -> Self {
        Self {
            log,
            trend_lookback,
        }
    }

    pub fn report(&self, set: &MarketDataSet) -> String {
        let sections: [(&str, Section); 6] = [
            ("Indicators", Self::indicators),
            ("Candlestick Pattern", Self::candlestick_pattern),
            ("Recent Direction", Self::recent_direction),
            ("Timeframe Change", Self::timeframe_change),
            ("Key Levels", Self::key_levels),
            ("Volume", Self::volume),
        ];

        let mut out = format!(
            "=== Market context: {} @ {} (trace {}) ===\n",
            set.symbol(),
            set.timestamp().to_rfc3339(),
            set.trace_id()
        );

        for (title, section) in sections {
            match section(self, set) {
                Ok(body) => {
                    let _ = writeln!(out, "{}: {}", title, body);
                }
                Err(e) => {
                    warn!(
                        "MarketContextReporter: {} section failed for {}: {}",
                        title,
                        set.symbol(),
                        e
                    );
                    self.log.fallback_usage(
                        &format!("enhanced_context.{}", title),
                        &e.to_string(),
                        ANALYSIS_FAILED,
                        set.trace_id(),
                    );
                    let _ = writeln!(out, "{}: {}", title, ANALYSIS_FAILED);
                }
            }
        }
        out
    }

    fn indicators(&self, set: &MarketDataSet) -> Result<String, MarketDataError> {
        let correlation = match set.btc_correlation() {
            Some(c) => c.round_dp(2).to_string(),
            None => "n/a".to_string(),
        };
        Ok(format!(
            "RSI(14) {} | MACD {} | MA20 {} vs MA50 {} ({}) | BTC correlation {}",
            set.rsi_14().round_dp(2),
            set.macd_signal(),
            set.ma_20().round_dp(4),
            set.ma_50().round_dp(4),
            set.ma_trend(),
            correlation
        ))
    }

    fn candlestick_pattern(&self, set: &MarketDataSet) -> Result<String, MarketDataError> {
        let latest = set
            .h1_candles()
            .latest()
            .ok_or_else(|| MarketDataError::insufficient("candlestick_pattern", 1, 0))?;

        let Some(shape) = CandleShape::of(latest) else {
            return Ok("none (zero-range candle)".to_string());
        };
        let name = match PatternRecognizer::classify(latest) {
            Some(pattern) => pattern.to_string(),
            None => "none".to_string(),
        };
        Ok(format!(
            "{} (body {}%, upper shadow {}%, lower shadow {}% of range)",
            name,
            percent(shape.body_ratio),
            percent(shape.upper_shadow_ratio),
            percent(shape.lower_shadow_ratio)
        ))
    }

    fn recent_direction(&self, set: &MarketDataSet) -> Result<String, MarketDataError> {
        let candles = set.h1_candles().candles();
        let run = PatternRecognizer::directional_run(candles, self.trend_lookback);
        Ok(format!("{} over the last {} hourly candles", run, self.trend_lookback))
    }

    fn timeframe_change(&self, set: &MarketDataSet) -> Result<String, MarketDataError> {
        let mut parts = Vec::with_capacity(3);
        for tf in Timeframe::all() {
            let table = set.table(tf);
            let (first, last) = match (table.candles().first(), table.latest()) {
                (Some(f), Some(l)) => (f.close, l.close),
                _ => return Err(MarketDataError::insufficient("timeframe_change", 1, 0)),
            };
            if first.is_zero() {
                return Err(MarketDataError::calculation(
                    "timeframe_change",
                    format!("{} first close is zero", tf),
                ));
            }
            parts.push(format!(
                "{} {}% over {} candles",
                tf,
                signed(percent((last - first) / first)),
                table.len()
            ));
        }
        Ok(parts.join(", "))
    }

    fn key_levels(&self, set: &MarketDataSet) -> Result<String, MarketDataError> {
        let price = set
            .h1_candles()
            .latest()
            .map(|c| c.close)
            .ok_or_else(|| MarketDataError::insufficient("key_levels", 1, 0))?;
        if price.is_zero() {
            return Err(MarketDataError::calculation("key_levels", "last close is zero"));
        }

        let to_support = (price - set.support_level()) / price;
        let to_resistance = (set.resistance_level() - price) / price;
        Ok(format!(
            "price {} | support {} ({}% below) | resistance {} ({}% above)",
            price,
            set.support_level(),
            percent(to_support),
            set.resistance_level(),
            percent(to_resistance)
        ))
    }

    fn volume(&self, set: &MarketDataSet) -> Result<String, MarketDataError> {
        let candles = set.h1_candles().candles();
        let latest = candles
            .last()
            .ok_or_else(|| MarketDataError::insufficient("volume", 1, 0))?;
        let avg = candles.iter().map(|c| c.volume).sum::<Decimal>() / Decimal::from(candles.len());

        Ok(format!(
            "{} (latest {} vs average {})",
            set.volume_profile(),
            latest.volume,
            avg.round_dp(4)
        ))
    }
}

fn percent(ratio: Decimal) -> Decimal {
    (ratio * Decimal::ONE_HUNDRED).round_dp(2)
}

fn signed(value: Decimal) -> String {
    if value.is_sign_negative() {
        value.to_string()
    } else {
        format!("+{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::candle::{Candle, CandleTable};
    use crate::domain::market::snapshot::{MacdSignal, MaTrend, MarketDataParts, VolumeProfile};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn table(tf: Timeframe, first_close: Decimal) -> CandleTable {
        let mut candles: Vec<Candle> = (0..10)
            .map(|i| Candle {
                timestamp: i * tf.to_millis(),
                open: dec!(100),
                high: dec!(101),
                low: dec!(99),
                close: dec!(100),
                volume: dec!(10),
            })
            .collect();
        candles[0].close = first_close;
        // last hourly candle is a hammer
        let last = candles.last_mut().unwrap();
        last.open = dec!(100.00);
        last.high = dec!(100.20);
        last.low = dec!(98.00);
        last.close = dec!(100.10);
        CandleTable::new("SOLUSDT", tf, candles)
    }

    fn snapshot(daily_first_close: Decimal) -> MarketDataSet {
        MarketDataSet::new(MarketDataParts {
            symbol: "SOLUSDT".to_string(),
            timestamp: Utc::now(),
            daily_candles: table(Timeframe::OneDay, daily_first_close),
            h4_candles: table(Timeframe::FourHour, dec!(100)),
            h1_candles: table(Timeframe::OneHour, dec!(100)),
            rsi_14: dec!(48.2),
            macd_signal: MacdSignal::Neutral,
            ma_20: dec!(100),
            ma_50: dec!(100),
            ma_trend: MaTrend::Sideways,
            support_level: dec!(98),
            resistance_level: dec!(101),
            volume_profile: VolumeProfile::Normal,
            btc_correlation: None,
            trace_id: "ctx-1".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_report_contains_every_section() {
        let reporter = MarketContextReporter::new(LogSink::disabled(), 5);
        let text = reporter.report(&snapshot(dec!(80)));

        assert!(text.contains("SOLUSDT"));
        assert!(text.contains("Candlestick Pattern: Hammer"));
        assert!(text.contains("BTC correlation n/a"));
        assert!(text.contains("1d +25"));
        assert!(text.contains("Key Levels: price 100.10"));
        assert!(!text.contains(ANALYSIS_FAILED));
    }

    #[test]
    fn test_failed_section_degrades_only_itself() {
        let reporter = MarketContextReporter::new(LogSink::disabled(), 5);
        let text = reporter.report(&snapshot(Decimal::ZERO));

        assert!(text.contains("Timeframe Change: analysis failed"));
        assert!(text.contains("Candlestick Pattern: Hammer"));
        assert!(text.contains("Volume: normal"));
    }
}
