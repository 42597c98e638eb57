//! Market snapshot CLI
//!
//! Fetches 1d/4h/1h klines from Binance for one symbol, computes the
//! technical snapshot and prints either the text context or the JSON context.
//!
//! # Usage
//! ```sh
//! cargo run --bin snapshot -- ETHUSDT
//! cargo run --bin snapshot -- SOLUSDT --json --trace-id my-run-1
//! ```
//!
//! # Environment Variables
//! - `BINANCE_BASE_URL` - REST endpoint (default: https://api.binance.com)
//! - `LOG_LEVEL` - default log filter when `RUST_LOG` is unset (default: info)
//! - `METRICS_ENABLED` - print Prometheus counters to stderr on exit (default: false)

use anyhow::{Context, Result};
use clap::Parser;
use market_snapshot::application::market_data::MarketDataAggregator;
use market_snapshot::config::Config;
use market_snapshot::domain::ports::MarketDataLogger;
use market_snapshot::infrastructure::binance::BinanceKlineClient;
use market_snapshot::infrastructure::observability::{Metrics, TracingLogger};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "snapshot", version, about = "Multi-timeframe technical snapshot of a trading pair")]
struct Args {
    /// Trading pair, e.g. ETHUSDT
    symbol: String,

    /// Print the JSON context instead of the text report
    #[arg(long)]
    json: bool,

    /// Trace id to attach to every log event (random when omitted)
    #[arg(long)]
    trace_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.observability.log_level))
        .context("Invalid LOG_LEVEL")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    info!("market-snapshot {} starting", env!("CARGO_PKG_VERSION"));

    let metrics = if config.observability.metrics_enabled {
        Some(Metrics::new()?)
    } else {
        None
    };
    let logger: Arc<dyn MarketDataLogger> = match &metrics {
        Some(m) => Arc::new(TracingLogger::with_metrics(m.clone())),
        None => Arc::new(TracingLogger::new()),
    };

    let client = BinanceKlineClient::builder()
        .base_url(config.binance.base_url.clone())
        .api_key(config.binance.api_key.clone())
        .build();

    let aggregator = MarketDataAggregator::builder(Arc::new(client))
        .logger(logger)
        .config(config.analysis.clone())
        .build();

    let set = aggregator
        .get_market_data(&args.symbol, args.trace_id.as_deref())
        .await?;

    if args.json {
        println!("{}", set.to_json_context()?);
    } else {
        println!("{}", aggregator.get_enhanced_context(&set));
    }

    if let Some(m) = metrics {
        eprintln!("{}", m.render());
    }
    Ok(())
}
