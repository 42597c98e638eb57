//! Configuration module for the snapshot engine.
//!
//! Structured configuration loading from environment variables, organized
//! by concern: Exchange, Analysis, and Observability.

mod analysis_config;
mod broker_config;
mod observability_config;

pub use analysis_config::AnalysisEnvConfig;
pub use broker_config::BinanceConfig;
pub use observability_config::ObservabilityEnvConfig;

use crate::domain::config::analysis_config::AnalysisConfig;
use anyhow::Result;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub binance: BinanceConfig,
    pub analysis: AnalysisConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            binance: BinanceConfig::from_env(),
            analysis: AnalysisEnvConfig::from_env()?,
            observability: ObservabilityEnvConfig::from_env()?,
        })
    }
}
