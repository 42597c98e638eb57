// Market data model
pub mod candle;
pub mod snapshot;
pub mod symbol;
pub mod timeframe;
