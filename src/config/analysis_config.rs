//! Analysis configuration parsing from environment variables.
//!
//! Every variable is optional; unset variables keep the
//! [`AnalysisConfig::default`] value, malformed ones are an error.

use crate::domain::config::analysis_config::{
    AnalysisConfig, CorrelationConfig, IndicatorConfig, ValidationConfig,
};
use crate::domain::market::symbol::validate_symbol;
use anyhow::{Context, Result, ensure};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub struct AnalysisEnvConfig;

impl AnalysisEnvConfig {
    pub fn from_env() -> Result<AnalysisConfig> {
        let d = AnalysisConfig::default();

        let validation = ValidationConfig {
            volatility_guard_pct: Self::parse_decimal(
                "VOLATILITY_GUARD_PCT",
                d.validation.volatility_guard_pct,
            )?,
            volatility_window: Self::parse_usize("VOLATILITY_WINDOW", d.validation.volatility_window)?,
            min_price: Self::parse_decimal("MIN_PRICE", d.validation.min_price)?,
            max_price: Self::parse_decimal("MAX_PRICE", d.validation.max_price)?,
            max_volume: Self::parse_decimal("MAX_VOLUME", d.validation.max_volume)?,
            min_candles_1h: Self::parse_usize("MIN_CANDLES_1H", d.validation.min_candles_1h)?,
            min_candles_4h: Self::parse_usize("MIN_CANDLES_4H", d.validation.min_candles_4h)?,
            min_candles_1d: Self::parse_usize("MIN_CANDLES_1D", d.validation.min_candles_1d)?,
        };
        ensure!(
            validation.min_price < validation.max_price,
            "MIN_PRICE must be below MAX_PRICE"
        );

        let i = &d.indicators;
        let indicators = IndicatorConfig {
            rsi_period: Self::parse_usize("RSI_PERIOD", i.rsi_period)?,
            macd_fast_period: Self::parse_usize("MACD_FAST_PERIOD", i.macd_fast_period)?,
            macd_slow_period: Self::parse_usize("MACD_SLOW_PERIOD", i.macd_slow_period)?,
            macd_signal_period: Self::parse_usize("MACD_SIGNAL_PERIOD", i.macd_signal_period)?,
            macd_threshold_pct: Self::parse_decimal("MACD_THRESHOLD_PCT", i.macd_threshold_pct)?,
            ma_fast_period: Self::parse_usize("MA_FAST_PERIOD", i.ma_fast_period)?,
            ma_slow_period: Self::parse_usize("MA_SLOW_PERIOD", i.ma_slow_period)?,
            trend_band_pct: Self::parse_decimal("TREND_BAND_PCT", i.trend_band_pct)?,
            support_resistance_lookback: Self::parse_usize(
                "SUPPORT_RESISTANCE_LOOKBACK",
                i.support_resistance_lookback,
            )?,
            volume_window: Self::parse_usize("VOLUME_WINDOW", i.volume_window)?,
            volume_high_multiplier: Self::parse_decimal(
                "VOLUME_HIGH_MULTIPLIER",
                i.volume_high_multiplier,
            )?,
            volume_low_multiplier: Self::parse_decimal(
                "VOLUME_LOW_MULTIPLIER",
                i.volume_low_multiplier,
            )?,
        };
        ensure!(
            indicators.macd_fast_period < indicators.macd_slow_period,
            "MACD_FAST_PERIOD must be below MACD_SLOW_PERIOD"
        );
        ensure!(
            indicators.ma_fast_period < indicators.ma_slow_period,
            "MA_FAST_PERIOD must be below MA_SLOW_PERIOD"
        );

        let c = &d.correlation;
        let reference_symbol = env::var("CORRELATION_REFERENCE_SYMBOL")
            .unwrap_or_else(|_| c.reference_symbol.clone());
        validate_symbol(&reference_symbol).context("Invalid CORRELATION_REFERENCE_SYMBOL")?;
        let correlation = CorrelationConfig {
            enabled: Self::parse_bool("CORRELATION_ENABLED", c.enabled)?,
            reference_symbol,
            timeframe: c.timeframe,
            fetch_limit: Self::parse_usize("CORRELATION_FETCH_LIMIT", c.fetch_limit)?,
            ttl: Duration::from_secs(Self::parse_u64("CORRELATION_TTL_SECS", c.ttl.as_secs())?),
            window: Self::parse_usize("CORRELATION_WINDOW", c.window)?,
            min_periods: Self::parse_usize("CORRELATION_MIN_PERIODS", c.min_periods)?,
        };
        ensure!(
            correlation.min_periods >= 2 && correlation.window >= correlation.min_periods,
            "CORRELATION_WINDOW must be >= CORRELATION_MIN_PERIODS >= 2"
        );

        Ok(AnalysisConfig {
            limit_1h: Self::parse_usize("CANDLE_LIMIT_1H", d.limit_1h)?,
            limit_4h: Self::parse_usize("CANDLE_LIMIT_4H", d.limit_4h)?,
            limit_1d: Self::parse_usize("CANDLE_LIMIT_1D", d.limit_1d)?,
            validation,
            indicators,
            correlation,
            pattern_trend_lookback: Self::parse_usize(
                "PATTERN_TREND_LOOKBACK",
                d.pattern_trend_lookback,
            )?,
        })
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_bool(key: &str, default: bool) -> Result<bool> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<bool>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_decimal(key: &str, default: Decimal) -> Result<Decimal> {
        match env::var(key) {
            Ok(raw) => Decimal::from_str(raw.trim()).context(format!("Failed to parse {}", key)),
            Err(_) => Ok(default),
        }
    }
}
