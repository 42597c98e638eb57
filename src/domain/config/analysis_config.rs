use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// Thresholds for [`CrossFieldValidator`](crate::domain::validation::data_quality::CrossFieldValidator)
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Maximum allowed |close - MA20| / MA20 for any row (0.5 = 50%)
    pub volatility_guard_pct: Decimal,
    /// Window of the rolling mean used by the volatility guard
    pub volatility_window: usize,
    /// Prices at or below this are treated as rounding to zero
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub max_volume: Decimal,
    pub min_candles_1h: usize,
    pub min_candles_4h: usize,
    pub min_candles_1d: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            volatility_guard_pct: dec!(0.5),
            volatility_window: 20,
            min_price: dec!(0.00000001),
            max_price: dec!(10000000),
            max_volume: dec!(1000000000000000),
            min_candles_1h: Timeframe::OneHour.min_candles(),
            min_candles_4h: Timeframe::FourHour.min_candles(),
            min_candles_1d: Timeframe::OneDay.min_candles(),
        }
    }
}

impl ValidationConfig {
    pub fn min_candles(&self, timeframe: Timeframe) -> usize {
        match timeframe {
            Timeframe::OneHour => self.min_candles_1h,
            Timeframe::FourHour => self.min_candles_4h,
            Timeframe::OneDay => self.min_candles_1d,
        }
    }
}

/// Indicator periods and classification bands
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    /// MACD/signal gap needed to leave `neutral`, as a fraction of the last close
    pub macd_threshold_pct: Decimal,
    pub ma_fast_period: usize,
    pub ma_slow_period: usize,
    /// Relative gap between MA fast and slow needed to call a trend
    pub trend_band_pct: Decimal,
    pub support_resistance_lookback: usize,
    pub volume_window: usize,
    pub volume_high_multiplier: Decimal,
    pub volume_low_multiplier: Decimal,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            macd_threshold_pct: dec!(0.0001),
            ma_fast_period: 20,
            ma_slow_period: 50,
            trend_band_pct: dec!(0.005),
            support_resistance_lookback: 20,
            volume_window: 20,
            volume_high_multiplier: dec!(1.5),
            volume_low_multiplier: dec!(0.5),
        }
    }
}

/// Reference-asset correlation settings
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationConfig {
    pub enabled: bool,
    pub reference_symbol: String,
    pub timeframe: Timeframe,
    pub fetch_limit: usize,
    pub ttl: Duration,
    /// Number of return periods correlated
    pub window: usize,
    pub min_periods: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reference_symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::OneHour,
            fetch_limit: 100,
            ttl: Duration::from_secs(300),
            window: 30,
            min_periods: 10,
        }
    }
}

/// Everything the aggregator needs besides its collaborators
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub limit_1h: usize,
    pub limit_4h: usize,
    pub limit_1d: usize,
    pub validation: ValidationConfig,
    pub indicators: IndicatorConfig,
    pub correlation: CorrelationConfig,
    /// Closes inspected for the recent directional run in the text report
    pub pattern_trend_lookback: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            limit_1h: 100,
            limit_4h: 100,
            limit_1d: 200,
            validation: ValidationConfig::default(),
            indicators: IndicatorConfig::default(),
            correlation: CorrelationConfig::default(),
            pattern_trend_lookback: 5,
        }
    }
}

impl AnalysisConfig {
    pub fn fetch_limit(&self, timeframe: Timeframe) -> usize {
        match timeframe {
            Timeframe::OneHour => self.limit_1h,
            Timeframe::FourHour => self.limit_4h,
            Timeframe::OneDay => self.limit_1d,
        }
    }
}
