//! Multi-timeframe market snapshot orchestration.
//!
//! `get_market_data` walks a fixed sequence of stages:
//! validating -> fetching -> cross_validating -> computing_indicators ->
//! computing_correlation -> assembled. Any error stops the walk and is
//! returned wrapped in an [`AggregationError`] naming the stage.

use crate::application::market_data::candle_table_builder::CandleTableBuilder;
use crate::application::market_data::correlation_cache::CorrelationCache;
use crate::application::market_data::indicator_engine::{IndicatorEngine, IndicatorSet};
use crate::application::market_data::market_context::MarketContextReporter;
use crate::domain::config::analysis_config::AnalysisConfig;
use crate::domain::errors::{AggregationError, MarketDataError, Stage};
use crate::domain::market::candle::CandleTable;
use crate::domain::market::snapshot::{MarketDataParts, MarketDataSet};
use crate::domain::market::symbol::{Symbol, SymbolValidator};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::{KlineSource, LogSink, MarketDataLogger};
use crate::domain::validation::data_quality::CrossFieldValidator;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const GET_MARKET_DATA: &str = "get_market_data";
const GET_ENHANCED_CONTEXT: &str = "get_enhanced_context";

/// Progress of the most recent `get_market_data` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationState {
    Idle,
    Validating,
    Fetching,
    CrossValidating,
    ComputingIndicators,
    ComputingCorrelation,
    Assembled,
    Failed { stage: Stage },
}

impl fmt::Display for AggregationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationState::Idle => write!(f, "idle"),
            AggregationState::Validating => write!(f, "validating"),
            AggregationState::Fetching => write!(f, "fetching"),
            AggregationState::CrossValidating => write!(f, "cross_validating"),
            AggregationState::ComputingIndicators => write!(f, "computing_indicators"),
            AggregationState::ComputingCorrelation => write!(f, "computing_correlation"),
            AggregationState::Assembled => write!(f, "assembled"),
            AggregationState::Failed { stage } => write!(f, "failed({})", stage),
        }
    }
}

type StageResult<T> = Result<T, (Stage, MarketDataError)>;

fn at<T>(stage: Stage, result: Result<T, MarketDataError>) -> StageResult<T> {
    result.map_err(|e| (stage, e))
}

struct Tables {
    daily: CandleTable,
    h4: CandleTable,
    h1: CandleTable,
}

pub struct MarketDataAggregator {
    source: Arc<dyn KlineSource>,
    config: AnalysisConfig,
    symbols: SymbolValidator,
    validator: CrossFieldValidator,
    indicators: IndicatorEngine,
    correlation: CorrelationCache,
    reporter: MarketContextReporter,
    log: LogSink,
    state: Mutex<AggregationState>,
}

impl MarketDataAggregator {
    pub fn builder(source: Arc<dyn KlineSource>) -> MarketDataAggregatorBuilder {
        MarketDataAggregatorBuilder {
            source,
            logger: None,
            config: AnalysisConfig::default(),
            symbols: SymbolValidator::default(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn correlation_cache(&self) -> &CorrelationCache {
        &self.correlation
    }

    /// Final state of the most recent call, or the stage it is currently in.
    pub fn last_state(&self) -> AggregationState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn enter(&self, next: AggregationState, symbol: &str) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!("MarketDataAggregator: {} {} -> {}", symbol, *state, next);
        *state = next;
    }

    /// Builds a fully validated snapshot for `symbol`. A fresh trace id is
    /// generated when none is supplied.
    pub async fn get_market_data(
        &self,
        symbol: &str,
        trace_id: Option<&str>,
    ) -> Result<MarketDataSet, AggregationError> {
        let trace_id = trace_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let started = Instant::now();

        self.log.operation_start(
            GET_MARKET_DATA,
            &json!({ "symbol": symbol }),
            &trace_id,
        );

        match self.run(symbol, &trace_id).await {
            Ok(set) => {
                self.enter(AggregationState::Assembled, symbol);
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!(
                    "MarketDataAggregator: Assembled {} in {}ms (rsi={}, macd={}, trend={})",
                    set.symbol(),
                    elapsed_ms,
                    set.rsi_14().round_dp(2),
                    set.macd_signal(),
                    set.ma_trend()
                );
                self.log.operation_complete(
                    GET_MARKET_DATA,
                    &json!({
                        "symbol": set.symbol(),
                        "duration_ms": elapsed_ms,
                        "candles": {
                            "d1": set.daily_candles().len(),
                            "h4": set.h4_candles().len(),
                            "h1": set.h1_candles().len(),
                        },
                        "btc_correlation": set.btc_correlation().map(|c| c.to_string()),
                    }),
                    &trace_id,
                );
                Ok(set)
            }
            Err((stage, source)) => {
                self.enter(AggregationState::Failed { stage }, symbol);
                warn!(
                    "MarketDataAggregator: {} failed at {} [trace_id={}]: {}",
                    symbol, stage, trace_id, source
                );
                self.log.operation_error(
                    GET_MARKET_DATA,
                    &json!({
                        "symbol": symbol,
                        "stage": stage.as_str(),
                        "error_type": source.kind(),
                        "category": source.category().to_string(),
                        "message": source.to_string(),
                        "duration_ms": started.elapsed().as_millis() as u64,
                    }),
                    &trace_id,
                );
                Err(AggregationError {
                    stage,
                    operation: GET_MARKET_DATA.to_string(),
                    symbol: symbol.to_string(),
                    trace_id,
                    source,
                })
            }
        }
    }

    async fn run(&self, raw_symbol: &str, trace_id: &str) -> StageResult<MarketDataSet> {
        self.enter(AggregationState::Validating, raw_symbol);
        let symbol = at(Stage::Validating, self.validate_symbol(raw_symbol, trace_id))?;

        self.enter(AggregationState::Fetching, raw_symbol);
        let tables = at(Stage::Fetching, self.fetch_tables(&symbol, trace_id).await)?;

        self.enter(AggregationState::CrossValidating, raw_symbol);
        for table in [&tables.daily, &tables.h4, &tables.h1] {
            at(Stage::CrossValidating, self.cross_validate(table, trace_id))?;
        }

        self.enter(AggregationState::ComputingIndicators, raw_symbol);
        let indicators = at(
            Stage::ComputingIndicators,
            self.indicators.compute(&tables.h1, &tables.daily),
        )?;
        self.log_indicators(symbol.as_str(), &indicators, trace_id);

        self.enter(AggregationState::ComputingCorrelation, raw_symbol);
        let btc_correlation = at(
            Stage::ComputingCorrelation,
            self.correlation_for(&tables.h1, trace_id).await,
        )?;

        let IndicatorSet {
            rsi_14,
            macd_signal,
            ma_20,
            ma_50,
            ma_trend,
            support_level,
            resistance_level,
            volume_profile,
        } = indicators;

        at(
            Stage::Assembling,
            MarketDataSet::new(MarketDataParts {
                symbol: symbol.as_str().to_string(),
                timestamp: Utc::now(),
                daily_candles: tables.daily,
                h4_candles: tables.h4,
                h1_candles: tables.h1,
                rsi_14,
                macd_signal,
                ma_20,
                ma_50,
                ma_trend,
                support_level,
                resistance_level,
                volume_profile,
                btc_correlation,
                trace_id: trace_id.to_string(),
            }),
        )
        .inspect_err(|(_, e)| self.report_validation(e, trace_id))
    }

    fn validate_symbol(&self, raw: &str, trace_id: &str) -> Result<Symbol, MarketDataError> {
        self.symbols
            .validate(raw)
            .inspect_err(|e| self.report_validation(e, trace_id))
    }

    async fn fetch_tables(&self, symbol: &Symbol, trace_id: &str) -> Result<Tables, MarketDataError> {
        Ok(Tables {
            daily: self.fetch_table(symbol, Timeframe::OneDay, trace_id).await?,
            h4: self.fetch_table(symbol, Timeframe::FourHour, trace_id).await?,
            h1: self.fetch_table(symbol, Timeframe::OneHour, trace_id).await?,
        })
    }

    async fn fetch_table(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        trace_id: &str,
    ) -> Result<CandleTable, MarketDataError> {
        let limit = self.config.fetch_limit(timeframe);
        let rows = self
            .source
            .fetch_klines(symbol.as_str(), timeframe, limit, trace_id)
            .await?;
        debug!(
            "MarketDataAggregator: Fetched {} {} rows for {} (limit {})",
            rows.len(),
            timeframe,
            symbol,
            limit
        );
        CandleTableBuilder::build(symbol.as_str(), timeframe, &rows)
    }

    fn cross_validate(&self, table: &CandleTable, trace_id: &str) -> Result<(), MarketDataError> {
        self.validator
            .validate(table)
            .inspect_err(|e| self.report_validation(e, trace_id))
    }

    async fn correlation_for(
        &self,
        h1: &CandleTable,
        trace_id: &str,
    ) -> Result<Option<Decimal>, MarketDataError> {
        if !self.config.correlation.enabled {
            return Ok(None);
        }
        let value = self.correlation.correlation(h1, trace_id).await?;
        self.log.calculation(
            "btc_correlation",
            h1.symbol(),
            &value.round_dp(4).to_string(),
            trace_id,
        );
        Ok(Some(value))
    }

    fn log_indicators(&self, symbol: &str, set: &IndicatorSet, trace_id: &str) {
        let results = [
            ("rsi_14", set.rsi_14.round_dp(2).to_string()),
            ("macd_signal", set.macd_signal.to_string()),
            ("ma_20", set.ma_20.round_dp(8).to_string()),
            ("ma_50", set.ma_50.round_dp(8).to_string()),
            ("ma_trend", set.ma_trend.to_string()),
            ("support_level", set.support_level.to_string()),
            ("resistance_level", set.resistance_level.to_string()),
            ("volume_profile", set.volume_profile.to_string()),
        ];
        for (indicator, result) in results {
            self.log.calculation(indicator, symbol, &result, trace_id);
        }
    }

    fn report_validation(&self, err: &MarketDataError, trace_id: &str) {
        let message = err.to_string();
        match err {
            MarketDataError::SymbolValidation {
                value,
                field,
                expected,
                ..
            } => self
                .log
                .validation_error(field, value, expected, &message, trace_id),
            MarketDataError::DataFrameValidation {
                table,
                check,
                value,
                expected,
            } => self.log.validation_error(
                &format!("{}.{}", table, check),
                value,
                expected,
                &message,
                trace_id,
            ),
            MarketDataError::FieldValidation {
                field,
                value,
                expected,
            } => self
                .log
                .validation_error(field, value, expected, &message, trace_id),
            _ => {}
        }
    }

    /// Text report built from `set` alone; never fails and never fetches.
    pub fn get_enhanced_context(&self, set: &MarketDataSet) -> String {
        self.log.operation_start(
            GET_ENHANCED_CONTEXT,
            &json!({ "symbol": set.symbol() }),
            set.trace_id(),
        );
        let report = self.reporter.report(set);
        self.log.operation_complete(
            GET_ENHANCED_CONTEXT,
            &json!({ "symbol": set.symbol(), "length": report.len() }),
            set.trace_id(),
        );
        report
    }
}

pub struct MarketDataAggregatorBuilder {
    source: Arc<dyn KlineSource>,
    logger: Option<Arc<dyn MarketDataLogger>>,
    config: AnalysisConfig,
    symbols: SymbolValidator,
}

impl MarketDataAggregatorBuilder {
    pub fn logger(mut self, logger: Arc<dyn MarketDataLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn symbol_validator(mut self, symbols: SymbolValidator) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn build(self) -> MarketDataAggregator {
        let log = LogSink::new(self.logger);
        let validator = CrossFieldValidator::new(self.config.validation.clone());
        let correlation = CorrelationCache::new(
            self.source.clone(),
            validator.clone(),
            self.config.correlation.clone(),
            log.clone(),
        );
        let reporter = MarketContextReporter::new(log.clone(), self.config.pattern_trend_lookback);

        MarketDataAggregator {
            source: self.source,
            indicators: IndicatorEngine::new(self.config.indicators.clone()),
            config: self.config,
            symbols: self.symbols,
            validator,
            correlation,
            reporter,
            log,
            state: Mutex::new(AggregationState::Idle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::MockKlineSource;

    fn aggregator(source: Arc<MockKlineSource>) -> MarketDataAggregator {
        MarketDataAggregator::builder(source).build()
    }

    #[tokio::test]
    async fn test_state_is_assembled_after_success() {
        let source = Arc::new(MockKlineSource::with_default_market(&["ETHUSDT", "BTCUSDT"]));
        let agg = aggregator(source);
        assert_eq!(agg.last_state(), AggregationState::Idle);

        let set = agg.get_market_data("ETHUSDT", Some("t-1")).await.unwrap();
        assert_eq!(set.trace_id(), "t-1");
        assert_eq!(agg.last_state(), AggregationState::Assembled);
    }

    #[tokio::test]
    async fn test_bad_symbol_fails_before_any_fetch() {
        let source = Arc::new(MockKlineSource::with_default_market(&["ETHUSDT", "BTCUSDT"]));
        let agg = aggregator(source.clone());

        let err = agg.get_market_data("eth", None).await.unwrap_err();
        assert_eq!(err.stage, Stage::Validating);
        assert!(err.inner().is_validation());
        assert!(!err.trace_id.is_empty());
        assert_eq!(source.total_fetches(), 0);
        assert_eq!(
            agg.last_state(),
            AggregationState::Failed {
                stage: Stage::Validating
            }
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(AggregationState::CrossValidating.to_string(), "cross_validating");
        assert_eq!(
            AggregationState::Failed {
                stage: Stage::Fetching
            }
            .to_string(),
            "failed(fetching)"
        );
    }
}
