//! Exchange configuration parsing from environment variables.

use std::env;

/// Binance REST configuration. Klines are public, so the key may be empty.
#[derive(Debug, Clone, Default)]
pub struct BinanceConfig {
    pub api_key: String,
    pub base_url: String,
}

impl BinanceConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("BINANCE_API_KEY").unwrap_or_default(),
            base_url: env::var("BINANCE_BASE_URL")
                .unwrap_or_else(|_| "https://api.binance.com".to_string()),
        }
    }
}
