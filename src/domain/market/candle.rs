use super::timeframe::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV interval. `timestamp` is the open time in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn upper_shadow(&self) -> Decimal {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> Decimal {
        self.open.min(self.close) - self.low
    }

    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// Ordered candles of one symbol at one timeframe.
///
/// Building a table does not check it; run it through
/// [`CrossFieldValidator`](crate::domain::validation::data_quality::CrossFieldValidator)
/// before computing anything from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleTable {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleTable {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            candles,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// The most recent `n` candles (all of them when the table is shorter)
    pub fn tail(&self, n: usize) -> &[Candle] {
        &self.candles[self.candles.len().saturating_sub(n)..]
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.close).collect()
    }
}
