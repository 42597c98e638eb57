// Snapshot orchestration, indicators, correlation and reporting
pub mod market_data;
