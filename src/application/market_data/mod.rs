// Market data processing modules
pub mod aggregator;
pub mod candle_table_builder;
pub mod correlation_cache;
pub mod indicator_engine;
pub mod market_context;
pub mod pattern_recognizer;

pub use aggregator::{AggregationState, MarketDataAggregator, MarketDataAggregatorBuilder};
