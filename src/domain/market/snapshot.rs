//! Immutable multi-timeframe snapshot handed to the decision process.

use super::candle::CandleTable;
use super::timeframe::Timeframe;
use crate::domain::errors::MarketDataError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacdSignal {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for MacdSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacdSignal::Bullish => write!(f, "bullish"),
            MacdSignal::Bearish => write!(f, "bearish"),
            MacdSignal::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaTrend {
    Uptrend,
    Downtrend,
    Sideways,
}

impl fmt::Display for MaTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaTrend::Uptrend => write!(f, "uptrend"),
            MaTrend::Downtrend => write!(f, "downtrend"),
            MaTrend::Sideways => write!(f, "sideways"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeProfile {
    High,
    Low,
    Normal,
}

impl fmt::Display for VolumeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeProfile::High => write!(f, "high"),
            VolumeProfile::Low => write!(f, "low"),
            VolumeProfile::Normal => write!(f, "normal"),
        }
    }
}

/// Raw inputs of a [`MarketDataSet`]; checked by [`MarketDataSet::new`].
#[derive(Debug, Clone)]
pub struct MarketDataParts {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub daily_candles: CandleTable,
    pub h4_candles: CandleTable,
    pub h1_candles: CandleTable,
    pub rsi_14: Decimal,
    pub macd_signal: MacdSignal,
    pub ma_20: Decimal,
    pub ma_50: Decimal,
    pub ma_trend: MaTrend,
    pub support_level: Decimal,
    pub resistance_level: Decimal,
    pub volume_profile: VolumeProfile,
    pub btc_correlation: Option<Decimal>,
    pub trace_id: String,
}

/// Validated snapshot. Every invariant is checked on construction, so a value
/// of this type is always internally consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataSet {
    symbol: String,
    timestamp: DateTime<Utc>,
    daily_candles: CandleTable,
    h4_candles: CandleTable,
    h1_candles: CandleTable,
    rsi_14: Decimal,
    macd_signal: MacdSignal,
    ma_20: Decimal,
    ma_50: Decimal,
    ma_trend: MaTrend,
    support_level: Decimal,
    resistance_level: Decimal,
    volume_profile: VolumeProfile,
    btc_correlation: Option<Decimal>,
    trace_id: String,
}

impl MarketDataSet {
    pub fn new(parts: MarketDataParts) -> Result<Self, MarketDataError> {
        if parts.symbol.is_empty() {
            return Err(MarketDataError::field("symbol", "''", "non-empty trading pair"));
        }
        if parts.trace_id.is_empty() {
            return Err(MarketDataError::field("trace_id", "''", "non-empty trace id"));
        }

        for (name, table) in [
            ("daily_candles", &parts.daily_candles),
            ("h4_candles", &parts.h4_candles),
            ("h1_candles", &parts.h1_candles),
        ] {
            if table.is_empty() {
                return Err(MarketDataError::table(name, "non_empty", 0, "at least 1 candle"));
            }
        }

        if parts.rsi_14 < Decimal::ZERO || parts.rsi_14 > Decimal::ONE_HUNDRED {
            return Err(MarketDataError::field(
                "rsi_14",
                parts.rsi_14,
                "value in range [0, 100]",
            ));
        }
        if parts.ma_20 <= Decimal::ZERO {
            return Err(MarketDataError::field("ma_20", parts.ma_20, "value > 0"));
        }
        if parts.ma_50 <= Decimal::ZERO {
            return Err(MarketDataError::field("ma_50", parts.ma_50, "value > 0"));
        }
        if parts.support_level <= Decimal::ZERO {
            return Err(MarketDataError::field(
                "support_level",
                parts.support_level,
                "value > 0",
            ));
        }
        if parts.support_level > parts.resistance_level {
            return Err(MarketDataError::field(
                "support_level",
                parts.support_level,
                format!("value <= resistance_level ({})", parts.resistance_level),
            ));
        }
        if let Some(corr) = parts.btc_correlation {
            if corr < Decimal::NEGATIVE_ONE || corr > Decimal::ONE {
                return Err(MarketDataError::field(
                    "btc_correlation",
                    corr,
                    "value in range [-1, 1]",
                ));
            }
        }

        Ok(Self {
            symbol: parts.symbol,
            timestamp: parts.timestamp,
            daily_candles: parts.daily_candles,
            h4_candles: parts.h4_candles,
            h1_candles: parts.h1_candles,
            rsi_14: parts.rsi_14,
            macd_signal: parts.macd_signal,
            ma_20: parts.ma_20,
            ma_50: parts.ma_50,
            ma_trend: parts.ma_trend,
            support_level: parts.support_level,
            resistance_level: parts.resistance_level,
            volume_profile: parts.volume_profile,
            btc_correlation: parts.btc_correlation,
            trace_id: parts.trace_id,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn daily_candles(&self) -> &CandleTable {
        &self.daily_candles
    }

    pub fn h4_candles(&self) -> &CandleTable {
        &self.h4_candles
    }

    pub fn h1_candles(&self) -> &CandleTable {
        &self.h1_candles
    }

    pub fn table(&self, timeframe: Timeframe) -> &CandleTable {
        match timeframe {
            Timeframe::OneDay => &self.daily_candles,
            Timeframe::FourHour => &self.h4_candles,
            Timeframe::OneHour => &self.h1_candles,
        }
    }

    pub fn rsi_14(&self) -> Decimal {
        self.rsi_14
    }

    pub fn macd_signal(&self) -> MacdSignal {
        self.macd_signal
    }

    pub fn ma_20(&self) -> Decimal {
        self.ma_20
    }

    pub fn ma_50(&self) -> Decimal {
        self.ma_50
    }

    pub fn ma_trend(&self) -> MaTrend {
        self.ma_trend
    }

    pub fn support_level(&self) -> Decimal {
        self.support_level
    }

    pub fn resistance_level(&self) -> Decimal {
        self.resistance_level
    }

    pub fn volume_profile(&self) -> VolumeProfile {
        self.volume_profile
    }

    pub fn btc_correlation(&self) -> Option<Decimal> {
        self.btc_correlation
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// JSON document for the decision prompt: headline indicators plus raw
    /// OHLCV rows keyed by timeframe (`d1`, `h4`, `h1`).
    pub fn to_json_context(&self) -> Result<String, MarketDataError> {
        let raw_candles: BTreeMap<&'static str, Vec<JsonCandle>> = Timeframe::all()
            .into_iter()
            .map(|tf| {
                let rows: Vec<JsonCandle> = self
                    .table(tf)
                    .candles()
                    .iter()
                    .map(|c| JsonCandle(c.timestamp, c.open, c.high, c.low, c.close, c.volume))
                    .collect();
                (tf.json_key(), rows)
            })
            .collect();

        let context = JsonContext {
            symbol: &self.symbol,
            timestamp: self.timestamp.to_rfc3339(),
            trace_id: &self.trace_id,
            primary_indicators: JsonIndicators {
                rsi_14: self.rsi_14.round_dp(2),
                macd_signal: self.macd_signal,
                ma_20: self.ma_20.round_dp(8),
                ma_50: self.ma_50.round_dp(8),
                ma_trend: self.ma_trend,
                support_level: self.support_level,
                resistance_level: self.resistance_level,
                volume_profile: self.volume_profile,
                btc_correlation: self.btc_correlation.map(|c| c.round_dp(4)),
            },
            raw_candles,
        };

        serde_json::to_string(&context)
            .map_err(|e| MarketDataError::calculation("json_context", e.to_string()))
    }
}

#[derive(Serialize)]
struct JsonContext<'a> {
    symbol: &'a str,
    timestamp: String,
    trace_id: &'a str,
    primary_indicators: JsonIndicators,
    raw_candles: BTreeMap<&'static str, Vec<JsonCandle>>,
}

#[derive(Serialize)]
struct JsonIndicators {
    rsi_14: Decimal,
    macd_signal: MacdSignal,
    ma_20: Decimal,
    ma_50: Decimal,
    ma_trend: MaTrend,
    support_level: Decimal,
    resistance_level: Decimal,
    volume_profile: VolumeProfile,
    btc_correlation: Option<Decimal>,
}

/// `[open_time, open, high, low, close, volume]`
#[derive(Serialize)]
struct JsonCandle(i64, Decimal, Decimal, Decimal, Decimal, Decimal);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::candle::Candle;
    use rust_decimal_macros::dec;

    fn table(tf: Timeframe, n: usize) -> CandleTable {
        let candles = (0..n)
            .map(|i| Candle {
                timestamp: i as i64 * tf.to_millis(),
                open: dec!(100),
                high: dec!(102),
                low: dec!(98),
                close: dec!(101),
                volume: dec!(12.5),
            })
            .collect();
        CandleTable::new("BTCUSDT", tf, candles)
    }

    fn parts() -> MarketDataParts {
        MarketDataParts {
            symbol: "BTCUSDT".to_string(),
            timestamp: Utc::now(),
            daily_candles: table(Timeframe::OneDay, 3),
            h4_candles: table(Timeframe::FourHour, 3),
            h1_candles: table(Timeframe::OneHour, 3),
            rsi_14: dec!(55.5),
            macd_signal: MacdSignal::Bullish,
            ma_20: dec!(101),
            ma_50: dec!(99),
            ma_trend: MaTrend::Uptrend,
            support_level: dec!(98),
            resistance_level: dec!(102),
            volume_profile: VolumeProfile::Normal,
            btc_correlation: Some(dec!(0.82)),
            trace_id: "trace-1".to_string(),
        }
    }

    #[test]
    fn test_valid_parts_build() {
        let set = MarketDataSet::new(parts()).unwrap();
        assert_eq!(set.symbol(), "BTCUSDT");
        assert_eq!(set.rsi_14(), dec!(55.5));
        assert_eq!(set.btc_correlation(), Some(dec!(0.82)));
    }

    #[test]
    fn test_rsi_out_of_range_is_rejected() {
        let mut p = parts();
        p.rsi_14 = dec!(150);
        let err = MarketDataSet::new(p).unwrap_err();
        assert!(err.is_validation());
        let msg = err.to_string();
        assert!(msg.contains("rsi_14"));
        assert!(msg.contains("[0, 100]"));
    }

    #[test]
    fn test_empty_daily_table_is_rejected() {
        let mut p = parts();
        p.daily_candles = CandleTable::new("BTCUSDT", Timeframe::OneDay, Vec::new());
        let err = MarketDataSet::new(p).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("daily_candles"));
    }

    #[test]
    fn test_scalar_invariants() {
        let mut p = parts();
        p.ma_50 = Decimal::ZERO;
        assert!(MarketDataSet::new(p).unwrap_err().to_string().contains("ma_50"));

        let mut p = parts();
        p.btc_correlation = Some(dec!(1.2));
        assert!(
            MarketDataSet::new(p)
                .unwrap_err()
                .to_string()
                .contains("btc_correlation")
        );

        let mut p = parts();
        p.support_level = dec!(103);
        assert!(MarketDataSet::new(p).is_err());

        let mut p = parts();
        p.btc_correlation = None;
        assert!(MarketDataSet::new(p).is_ok());
    }

    #[test]
    fn test_json_context_shape() {
        let set = MarketDataSet::new(parts()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&set.to_json_context().unwrap()).unwrap();

        assert_eq!(json["symbol"], "BTCUSDT");
        assert_eq!(json["primary_indicators"]["macd_signal"], "bullish");
        assert_eq!(json["primary_indicators"]["ma_trend"], "uptrend");
        let h1 = json["raw_candles"]["h1"].as_array().unwrap();
        assert_eq!(h1.len(), 3);
        assert_eq!(h1[0].as_array().unwrap().len(), 6);
        assert!(json["raw_candles"]["d1"].is_array());
        assert!(json["raw_candles"]["h4"].is_array());
    }
}
