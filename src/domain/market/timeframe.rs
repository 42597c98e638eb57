use crate::domain::errors::MarketDataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle resolutions the snapshot is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    OneHour,
    FourHour,
    OneDay,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
        }
    }

    /// Returns the duration in milliseconds, the unit of Binance open times
    pub fn to_millis(&self) -> i64 {
        self.to_minutes() * 60 * 1000
    }

    /// Converts to Binance API interval string
    pub fn to_binance_string(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
        }
    }

    /// Key used for this timeframe in the JSON context
    pub fn json_key(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "h1",
            Timeframe::FourHour => "h4",
            Timeframe::OneDay => "d1",
        }
    }

    /// Name of the `MarketDataSet` field holding this timeframe's table
    pub fn table_name(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "h1_candles",
            Timeframe::FourHour => "h4_candles",
            Timeframe::OneDay => "daily_candles",
        }
    }

    /// Minimum number of candles a table needs before indicators may run
    pub fn min_candles(&self) -> usize {
        match self {
            Timeframe::OneHour => 48,
            Timeframe::FourHour => 84,
            Timeframe::OneDay => 180,
        }
    }

    /// Timeframes fetched for every snapshot, slowest first
    pub fn all() -> [Timeframe; 3] {
        [Timeframe::OneDay, Timeframe::FourHour, Timeframe::OneHour]
    }
}

impl FromStr for Timeframe {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1h" | "1hour" | "h1" => Ok(Timeframe::OneHour),
            "4h" | "4hour" | "h4" => Ok(Timeframe::FourHour),
            "1d" | "1day" | "d1" | "daily" => Ok(Timeframe::OneDay),
            _ => Err(MarketDataError::field(
                "timeframe",
                s,
                "one of 1h, 4h, 1d",
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_string())
    }
}
