//! Engine configuration value objects
//!
//! Plain data with defaults; loading from the environment lives in `crate::config`.

pub mod analysis_config;

pub use analysis_config::{AnalysisConfig, CorrelationConfig, IndicatorConfig, ValidationConfig};
