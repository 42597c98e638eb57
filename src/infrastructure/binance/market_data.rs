//! Binance REST kline client
//!
//! Implements [`KlineSource`] against `GET /api/v3/klines`. Transient failures
//! are retried inside the HTTP middleware; whatever survives is mapped onto the
//! network family of [`MarketDataError`].

use crate::domain::errors::MarketDataError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::KlineSource;
use crate::infrastructure::core::http_client_factory::{
    HttpClientFactory, HttpClientSettings, build_url_with_query,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_BINANCE_BASE_URL: &str = "https://api.binance.com";
const KLINES_PATH: &str = "/api/v3/klines";
/// Binance rejects larger `limit` values
pub const MAX_KLINES_LIMIT: usize = 1000;
/// Returned by Binance once an IP keeps hammering after 429s
const IP_BANNED: u16 = 418;

pub struct BinanceKlineClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
}

impl BinanceKlineClient {
    pub fn builder() -> BinanceKlineClientBuilder {
        BinanceKlineClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Default)]
pub struct BinanceKlineClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    http: Option<HttpClientSettings>,
}

impl BinanceKlineClientBuilder {
    pub fn api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn http_settings(mut self, settings: HttpClientSettings) -> Self {
        self.http = Some(settings);
        self
    }

    /// Klines are public data, so the API key is optional.
    pub fn build(self) -> BinanceKlineClient {
        let settings = self.http.unwrap_or_default();
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BINANCE_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        BinanceKlineClient {
            client: HttpClientFactory::create_client(&settings),
            api_key: self.api_key.unwrap_or_default(),
            base_url,
        }
    }
}

#[async_trait]
impl KlineSource for BinanceKlineClient {
    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        limit: usize,
        trace_id: &str,
    ) -> Result<Vec<Value>, MarketDataError> {
        let limit = limit.clamp(1, MAX_KLINES_LIMIT).to_string();
        let url = build_url_with_query(
            &format!("{}{}", self.base_url, KLINES_PATH),
            &[
                ("symbol", symbol),
                ("interval", interval.to_binance_string()),
                ("limit", &limit),
            ],
        );

        let mut request = self.client.get(&url);
        if !self.api_key.is_empty() {
            request = request.header("X-MBX-APIKEY", &self.api_key);
        }

        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| MarketDataError::ApiConnection {
                message: format!("klines {} {}: {}", symbol, interval, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status, retry_after, &body);
            warn!(
                "BinanceKlineClient: {} {} rejected [trace_id={}]: {}",
                symbol, interval, trace_id, err
            );
            return Err(err);
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| MarketDataError::ApiResponse {
                status: status.as_u16(),
                message: format!("unreadable klines payload: {}", e),
            })?;

        debug!(
            "BinanceKlineClient: {} {} -> {} rows in {}ms [trace_id={}]",
            symbol,
            interval,
            rows.len(),
            started.elapsed().as_millis(),
            trace_id
        );
        Ok(rows)
    }
}

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

/// Maps a non-2xx answer onto the network error family.
pub fn classify_failure(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> MarketDataError {
    let message = match serde_json::from_str::<BinanceErrorBody>(body) {
        Ok(err) => format!("{} (code {})", err.msg, err.code),
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string(),
        Err(_) => body.chars().take(200).collect(),
    };

    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == IP_BANNED {
        MarketDataError::RateLimit {
            message,
            retry_after_secs,
        }
    } else {
        MarketDataError::ApiResponse {
            status: status.as_u16(),
            message,
        }
    }
}
