use std::fmt;
use thiserror::Error;

/// Coarse grouping used by callers that only care whether a failure came from
/// bad input, the exchange, or a derived computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Network,
    Processing,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Processing => write!(f, "processing"),
        }
    }
}

/// Errors raised by the market data engine.
///
/// Variants are grouped in three families, see [`ErrorCategory`]. Validation
/// failures are never retried, network failures are surfaced exactly as the
/// exchange client reported them, and processing failures mean a derived value
/// could not be computed from otherwise valid data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketDataError {
    // --- Validation family ---
    #[error("Invalid {field} '{value}': {reason} (expected {expected})")]
    SymbolValidation {
        value: String,
        field: String,
        expected: String,
        reason: String,
    },

    #[error("Table {table} failed {check} check: got {value}, expected {expected}")]
    DataFrameValidation {
        table: String,
        check: String,
        value: String,
        expected: String,
    },

    #[error("Invalid {field}: got {value}, expected {expected}")]
    FieldValidation {
        field: String,
        value: String,
        expected: String,
    },

    // --- Network family ---
    #[error("API connection failed: {message}")]
    ApiConnection { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("API responded with status {status}: {message}")]
    ApiResponse { status: u16, message: String },

    // --- Processing family ---
    #[error("Calculation of {indicator} failed: {reason}")]
    Calculation { indicator: String, reason: String },

    #[error("Insufficient data for {operation}: required={required}, available={available}")]
    DataInsufficient {
        operation: String,
        required: usize,
        available: usize,
    },

    #[error("Malformed {timeframe} candle at row {row}: field {field} = '{value}'")]
    MalformedCandle {
        timeframe: String,
        row: usize,
        field: String,
        value: String,
    },
}

impl MarketDataError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SymbolValidation { .. }
            | Self::DataFrameValidation { .. }
            | Self::FieldValidation { .. } => ErrorCategory::Validation,

            Self::ApiConnection { .. } | Self::RateLimit { .. } | Self::ApiResponse { .. } => {
                ErrorCategory::Network
            }

            Self::Calculation { .. }
            | Self::DataInsufficient { .. }
            | Self::MalformedCandle { .. } => ErrorCategory::Processing,
        }
    }

    /// Stable discriminant, safe to match on in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SymbolValidation { .. } => "SymbolValidationError",
            Self::DataFrameValidation { .. } => "DataFrameValidationError",
            Self::FieldValidation { .. } => "FieldValidationError",
            Self::ApiConnection { .. } => "APIConnectionError",
            Self::RateLimit { .. } => "RateLimitError",
            Self::ApiResponse { .. } => "APIResponseError",
            Self::Calculation { .. } => "CalculationError",
            Self::DataInsufficient { .. } => "DataInsufficientError",
            Self::MalformedCandle { .. } => "MalformedCandleError",
        }
    }

    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    pub fn is_network(&self) -> bool {
        self.category() == ErrorCategory::Network
    }

    pub fn is_processing(&self) -> bool {
        self.category() == ErrorCategory::Processing
    }

    pub fn calculation(indicator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Calculation {
            indicator: indicator.into(),
            reason: reason.into(),
        }
    }

    pub fn insufficient(operation: impl Into<String>, required: usize, available: usize) -> Self {
        Self::DataInsufficient {
            operation: operation.into(),
            required,
            available,
        }
    }

    pub fn table(
        table: impl Into<String>,
        check: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        Self::DataFrameValidation {
            table: table.into(),
            check: check.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    pub fn field(field: impl Into<String>, value: impl ToString, expected: impl Into<String>) -> Self {
        Self::FieldValidation {
            field: field.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

/// Stage of a `get_market_data` call at which an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validating,
    Fetching,
    CrossValidating,
    ComputingIndicators,
    ComputingCorrelation,
    Assembling,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Fetching => "fetching",
            Stage::CrossValidating => "cross_validating",
            Stage::ComputingIndicators => "computing_indicators",
            Stage::ComputingCorrelation => "computing_correlation",
            Stage::Assembling => "assembling",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`MarketDataError`] annotated with the call context it escaped from.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{operation} failed at stage {stage} for {symbol} [trace_id={trace_id}]: {source}")]
pub struct AggregationError {
    pub stage: Stage,
    pub operation: String,
    pub symbol: String,
    pub trace_id: String,
    #[source]
    pub source: MarketDataError,
}

impl AggregationError {
    pub fn category(&self) -> ErrorCategory {
        self.source.category()
    }

    pub fn inner(&self) -> &MarketDataError {
        &self.source
    }
}
