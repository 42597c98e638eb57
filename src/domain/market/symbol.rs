//! Trading pair validation.
//!
//! Only spot pairs quoted in a single currency (USDT by default) are accepted,
//! in exchange-native form without separators, e.g. `BTCUSDT`.

use crate::domain::errors::MarketDataError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_QUOTE_CURRENCY: &str = "USDT";
pub const DEFAULT_MAX_SYMBOL_LEN: usize = 12;

/// Base prefixes that pass the character checks but never name a real asset.
const INVALID_BASE_PREFIXES: &[&str] = &["X", "XX", "XXX", "TEST", "NULL", "NONE"];

/// A trading pair that passed [`SymbolValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pair: String,
    base_len: usize,
}

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.pair
    }

    pub fn base(&self) -> &str {
        &self.pair[..self.base_len]
    }

    pub fn quote(&self) -> &str {
        &self.pair[self.base_len..]
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pair)
    }
}

#[derive(Debug, Clone)]
pub struct SymbolValidator {
    quote: String,
    max_len: usize,
}

impl Default for SymbolValidator {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_CURRENCY, DEFAULT_MAX_SYMBOL_LEN)
    }
}

impl SymbolValidator {
    pub fn new(quote: impl Into<String>, max_len: usize) -> Self {
        Self {
            quote: quote.into(),
            max_len,
        }
    }

    fn expected(&self) -> String {
        format!(
            "uppercase base asset followed by {} (e.g. BTC{}), at most {} characters",
            self.quote, self.quote, self.max_len
        )
    }

    fn reject(&self, value: &str, reason: impl Into<String>) -> MarketDataError {
        MarketDataError::SymbolValidation {
            value: value.to_string(),
            field: "symbol".to_string(),
            expected: self.expected(),
            reason: reason.into(),
        }
    }

    /// Checks, in order: non-empty, length, a single trailing quote currency,
    /// an uppercase alphabetic base, and the base deny-list.
    pub fn validate(&self, value: &str) -> Result<Symbol, MarketDataError> {
        if value.is_empty() {
            return Err(self.reject(value, "symbol is empty"));
        }

        if value.chars().count() > self.max_len {
            return Err(self.reject(
                value,
                format!("symbol is too long ({} > {})", value.chars().count(), self.max_len),
            ));
        }

        let occurrences = value.matches(self.quote.as_str()).count();
        if occurrences == 0 || !value.ends_with(self.quote.as_str()) {
            return Err(self.reject(
                value,
                format!("symbol must end with quote currency {}", self.quote),
            ));
        }
        if occurrences > 1 {
            return Err(self.reject(
                value,
                format!("quote currency {} appears {} times", self.quote, occurrences),
            ));
        }

        let base = &value[..value.len() - self.quote.len()];
        if base.is_empty() {
            return Err(self.reject(value, "base asset is missing"));
        }
        if !base.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(self.reject(
                value,
                format!("base asset '{}' must contain only uppercase letters A-Z", base),
            ));
        }
        if INVALID_BASE_PREFIXES.contains(&base) {
            return Err(self.reject(value, format!("base asset '{}' is not a valid asset", base)));
        }

        Ok(Symbol {
            pair: value.to_string(),
            base_len: base.len(),
        })
    }
}

/// Validates with the default USDT rules.
pub fn validate_symbol(value: &str) -> Result<Symbol, MarketDataError> {
    SymbolValidator::default().validate(value)
}
