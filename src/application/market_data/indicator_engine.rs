//! Decimal technical indicators for validated candle tables.
//!
//! Every function here is total over validated input: flat prices, monotonic
//! runs and single outliers all map to a defined output. The only error is
//! `DataInsufficient`, raised when a table is shorter than the indicator period
//! (which validated tables never are with the default configuration).

use crate::domain::config::analysis_config::IndicatorConfig;
use crate::domain::errors::MarketDataError;
use crate::domain::market::candle::{Candle, CandleTable};
use crate::domain::market::snapshot::{MaTrend, MacdSignal, VolumeProfile};
use rust_decimal::Decimal;
use tracing::debug;

/// Indicator values that end up in a `MarketDataSet`
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub rsi_14: Decimal,
    pub macd_signal: MacdSignal,
    pub ma_20: Decimal,
    pub ma_50: Decimal,
    pub ma_trend: MaTrend,
    pub support_level: Decimal,
    pub resistance_level: Decimal,
    pub volume_profile: VolumeProfile,
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Momentum indicators and volume come from the hourly table; moving
    /// averages and levels from the daily table, the only one long enough
    /// for MA-50.
    pub fn compute(
        &self,
        h1: &CandleTable,
        daily: &CandleTable,
    ) -> Result<IndicatorSet, MarketDataError> {
        let h1_closes = h1.closes();
        let daily_closes = daily.closes();

        let rsi_14 = self.rsi(&h1_closes)?;
        let macd_signal = self.macd_signal(&h1_closes)?;
        let ma_20 = sma(&daily_closes, self.config.ma_fast_period)?;
        let ma_50 = sma(&daily_closes, self.config.ma_slow_period)?;
        let ma_trend = self.ma_trend(ma_20, ma_50);
        let (support_level, resistance_level) = self.support_resistance(daily.candles())?;
        let volume_profile = self.volume_profile(h1.candles())?;

        debug!(
            "IndicatorEngine: {} rsi={} macd={} ma20={} ma50={} trend={} S/R={}/{} volume={}",
            h1.symbol(),
            rsi_14.round_dp(2),
            macd_signal,
            ma_20.round_dp(4),
            ma_50.round_dp(4),
            ma_trend,
            support_level,
            resistance_level,
            volume_profile
        );

        Ok(IndicatorSet {
            rsi_14,
            macd_signal,
            ma_20,
            ma_50,
            ma_trend,
            support_level,
            resistance_level,
            volume_profile,
        })
    }

    /// RSI over the most recent `period` changes. Older history never
    /// enters the averages, so the value does not depend on the fetch limit.
    pub fn rsi(&self, closes: &[Decimal]) -> Result<Decimal, MarketDataError> {
        let period = self.config.rsi_period;
        if period == 0 || closes.len() < period + 1 {
            return Err(MarketDataError::insufficient(
                "rsi",
                period + 1,
                closes.len(),
            ));
        }

        let (gains, losses) = closes[closes.len() - period - 1..]
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .fold((Decimal::ZERO, Decimal::ZERO), |(gains, losses), change| {
                if change > Decimal::ZERO {
                    (gains + change, losses)
                } else {
                    (gains, losses - change)
                }
            });

        let n = Decimal::from(period);
        Ok(rsi_from_averages(gains / n, losses / n))
    }

    pub fn macd_signal(&self, closes: &[Decimal]) -> Result<MacdSignal, MarketDataError> {
        let (macd, signal) = self.macd(closes)?;
        let last_close = closes.last().copied().unwrap_or(Decimal::ZERO);
        let threshold = (last_close * self.config.macd_threshold_pct).abs();
        let gap = macd - signal;

        Ok(if gap > threshold {
            MacdSignal::Bullish
        } else if gap < -threshold {
            MacdSignal::Bearish
        } else {
            MacdSignal::Neutral
        })
    }

    /// Latest MACD line and signal line values.
    pub fn macd(&self, closes: &[Decimal]) -> Result<(Decimal, Decimal), MarketDataError> {
        let fast_p = self.config.macd_fast_period;
        let slow_p = self.config.macd_slow_period;
        let signal_p = self.config.macd_signal_period;
        let required = slow_p.max(fast_p) + signal_p - 1;

        if fast_p == 0 || signal_p == 0 || fast_p >= slow_p || closes.len() < required {
            return Err(MarketDataError::insufficient("macd", required, closes.len()));
        }

        let fast = ema_series(closes, fast_p);
        let slow = ema_series(closes, slow_p);
        let offset = slow_p - fast_p;
        let line: Vec<Decimal> = slow
            .iter()
            .enumerate()
            .map(|(i, s)| fast[i + offset] - s)
            .collect();
        let signal = ema_series(&line, signal_p);

        match (line.last(), signal.last()) {
            (Some(m), Some(s)) => Ok((*m, *s)),
            _ => Err(MarketDataError::insufficient("macd", required, closes.len())),
        }
    }

    pub fn ma_trend(&self, ma_fast: Decimal, ma_slow: Decimal) -> MaTrend {
        if ma_slow <= Decimal::ZERO {
            return MaTrend::Sideways;
        }
        let spread = (ma_fast - ma_slow) / ma_slow;
        if spread > self.config.trend_band_pct {
            MaTrend::Uptrend
        } else if spread < -self.config.trend_band_pct {
            MaTrend::Downtrend
        } else {
            MaTrend::Sideways
        }
    }

    /// `(support, resistance)`: lowest low and highest high of the lookback
    /// window. Flat data yields equal levels.
    pub fn support_resistance(
        &self,
        candles: &[Candle],
    ) -> Result<(Decimal, Decimal), MarketDataError> {
        let lookback = self.config.support_resistance_lookback.max(1);
        let window = &candles[candles.len().saturating_sub(lookback)..];

        let support = window.iter().map(|c| c.low).min();
        let resistance = window.iter().map(|c| c.high).max();
        match (support, resistance) {
            (Some(s), Some(r)) => Ok((s, r)),
            _ => Err(MarketDataError::insufficient("support_resistance", 1, 0)),
        }
    }

    pub fn volume_profile(&self, candles: &[Candle]) -> Result<VolumeProfile, MarketDataError> {
        let window_len = self.config.volume_window.max(1);
        let window = &candles[candles.len().saturating_sub(window_len)..];
        let latest = window
            .last()
            .ok_or_else(|| MarketDataError::insufficient("volume_profile", 1, 0))?;

        let avg = window.iter().map(|c| c.volume).sum::<Decimal>() / Decimal::from(window.len());
        if avg <= Decimal::ZERO {
            return Ok(VolumeProfile::Normal);
        }

        Ok(if latest.volume > avg * self.config.volume_high_multiplier {
            VolumeProfile::High
        } else if latest.volume < avg * self.config.volume_low_multiplier {
            VolumeProfile::Low
        } else {
            VolumeProfile::Normal
        })
    }
}

/// RSI from smoothed averages.
///
/// No movement at all is reported as 50; no losses as 100.
pub fn rsi_from_averages(avg_gain: Decimal, avg_loss: Decimal) -> Decimal {
    if avg_loss.is_zero() {
        return if avg_gain.is_zero() {
            Decimal::from(50)
        } else {
            Decimal::ONE_HUNDRED
        };
    }
    let rs = avg_gain / avg_loss;
    let rsi = Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + rs);
    rsi.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// Simple mean of the last `period` values.
pub fn sma(values: &[Decimal], period: usize) -> Result<Decimal, MarketDataError> {
    if period == 0 || values.len() < period {
        return Err(MarketDataError::insufficient(
            format!("sma_{}", period),
            period.max(1),
            values.len(),
        ));
    }
    let window = &values[values.len() - period..];
    Ok(window.iter().sum::<Decimal>() / Decimal::from(period))
}

/// EMA over `values`, seeded with the SMA of the first `period` values.
/// Element `i` of the result corresponds to `values[i + period - 1]`.
pub fn ema_series(values: &[Decimal], period: usize) -> Vec<Decimal> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let alpha = Decimal::TWO / Decimal::from(period + 1);
    let seed = values[..period].iter().sum::<Decimal>() / Decimal::from(period);

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for v in &values[period..] {
        prev += (*v - prev) * alpha;
        out.push(prev);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> IndicatorEngine {
        IndicatorEngine::default()
    }

    fn series(start: Decimal, step: Decimal, n: usize) -> Vec<Decimal> {
        (0..n).map(|i| start + step * Decimal::from(i)).collect()
    }

    fn candles_from(closes: &[Decimal], volume: Decimal) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| Candle {
                timestamp: i as i64,
                open: *c,
                high: *c + dec!(1),
                low: *c - dec!(1),
                close: *c,
                volume,
            })
            .collect()
    }

    #[test]
    fn test_rsi_flat_is_exactly_fifty() {
        let closes = vec![dec!(100); 48];
        assert_eq!(engine().rsi(&closes).unwrap(), dec!(50));
    }

    #[test]
    fn test_rsi_monotonic_runs() {
        let up = series(dec!(100), dec!(0.5), 48);
        assert!(engine().rsi(&up).unwrap() >= dec!(90));

        let down = series(dec!(100), dec!(-0.5), 48);
        assert!(engine().rsi(&down).unwrap() <= dec!(10));
    }

    #[test]
    fn test_rsi_only_sees_last_period_changes() {
        let mut closes = series(dec!(300), dec!(-1), 86);
        let bottom = *closes.last().unwrap();
        closes.extend(series(bottom + dec!(1), dec!(1), 14));
        assert_eq!(closes.len(), 100);
        assert_eq!(engine().rsi(&closes).unwrap(), dec!(100));

        // same tail, different amount of history
        let short = &closes[closes.len() - 15..];
        assert_eq!(engine().rsi(short).unwrap(), engine().rsi(&closes).unwrap());
    }

    #[test]
    fn test_rsi_mixed_tail() {
        // 14 changes: seven +2 and seven -1 -> RS = 2, RSI = 66.66..
        let mut closes = vec![dec!(500), dec!(400)];
        let mut last = dec!(100);
        closes.push(last);
        for i in 0..14 {
            last += if i % 2 == 0 { dec!(2) } else { dec!(-1) };
            closes.push(last);
        }
        let rsi = engine().rsi(&closes).unwrap();
        assert!((rsi - dec!(66.6666)).abs() < dec!(0.001), "rsi = {}", rsi);
    }

    #[test]
    fn test_rsi_division_policy() {
        assert_eq!(rsi_from_averages(dec!(0), dec!(0)), dec!(50));
        assert_eq!(rsi_from_averages(dec!(1.5), dec!(0)), dec!(100));
        assert_eq!(rsi_from_averages(dec!(0), dec!(2)), dec!(0));
        assert_eq!(rsi_from_averages(dec!(1), dec!(1)), dec!(50));
    }

    #[test]
    fn test_rsi_requires_period_plus_one() {
        let err = engine().rsi(&vec![dec!(1); 14]).unwrap_err();
        assert_eq!(err, MarketDataError::insufficient("rsi", 15, 14));
        assert!(engine().rsi(&vec![dec!(1); 15]).is_ok());
    }

    #[test]
    fn test_ema_of_constant_is_constant() {
        let ema = ema_series(&vec![dec!(42.5); 30], 12);
        assert_eq!(ema.len(), 19);
        assert!(ema.iter().all(|v| *v == dec!(42.5)));
    }

    #[test]
    fn test_ema_follows_trend() {
        let ema = ema_series(&series(dec!(1), dec!(1), 20), 5);
        assert_eq!(ema[0], dec!(3));
        assert!(ema.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_macd_classification() {
        let flat = vec![dec!(250); 48];
        assert_eq!(engine().macd_signal(&flat).unwrap(), MacdSignal::Neutral);

        // Accelerating rally: MACD line pulls away above its signal line
        let rally: Vec<Decimal> = (0..48)
            .map(|i| dec!(100) + Decimal::from(i * i) / dec!(10))
            .collect();
        assert_eq!(engine().macd_signal(&rally).unwrap(), MacdSignal::Bullish);

        let selloff: Vec<Decimal> = (0..48)
            .map(|i| dec!(500) - Decimal::from(i * i) / dec!(10))
            .collect();
        assert_eq!(engine().macd_signal(&selloff).unwrap(), MacdSignal::Bearish);
    }

    #[test]
    fn test_macd_needs_slow_plus_signal_history() {
        let err = engine().macd(&vec![dec!(1); 33]).unwrap_err();
        assert_eq!(err, MarketDataError::insufficient("macd", 34, 33));
        assert!(engine().macd(&vec![dec!(1); 34]).is_ok());
    }

    #[test]
    fn test_ma_trend_band() {
        let e = engine();
        assert_eq!(e.ma_trend(dec!(101), dec!(100)), MaTrend::Uptrend);
        assert_eq!(e.ma_trend(dec!(99), dec!(100)), MaTrend::Downtrend);
        assert_eq!(e.ma_trend(dec!(100.4), dec!(100)), MaTrend::Sideways);
        assert_eq!(e.ma_trend(dec!(100), dec!(100)), MaTrend::Sideways);
    }

    #[test]
    fn test_sma_uses_tail() {
        let values = series(dec!(1), dec!(1), 10);
        assert_eq!(sma(&values, 4).unwrap(), dec!(8.5));
        assert!(sma(&values, 11).is_err());
    }

    #[test]
    fn test_support_resistance() {
        let candles = candles_from(&series(dec!(100), dec!(1), 30), dec!(1));
        let (support, resistance) = engine().support_resistance(&candles).unwrap();
        // last 20 closes are 110..=129
        assert_eq!(support, dec!(109));
        assert_eq!(resistance, dec!(130));

        let flat: Vec<Candle> = (0..30)
            .map(|i| Candle {
                timestamp: i,
                open: dec!(5),
                high: dec!(5),
                low: dec!(5),
                close: dec!(5),
                volume: dec!(1),
            })
            .collect();
        let (support, resistance) = engine().support_resistance(&flat).unwrap();
        assert_eq!(support, resistance);
    }

    #[test]
    fn test_volume_profile() {
        let closes = vec![dec!(100); 30];
        let mut candles = candles_from(&closes, dec!(10));
        assert_eq!(engine().volume_profile(&candles).unwrap(), VolumeProfile::Normal);

        candles.last_mut().unwrap().volume = dec!(50);
        assert_eq!(engine().volume_profile(&candles).unwrap(), VolumeProfile::High);

        candles.last_mut().unwrap().volume = dec!(1);
        assert_eq!(engine().volume_profile(&candles).unwrap(), VolumeProfile::Low);

        let silent = candles_from(&closes, Decimal::ZERO);
        assert_eq!(engine().volume_profile(&silent).unwrap(), VolumeProfile::Normal);
    }
}
