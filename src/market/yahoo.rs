use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::market::{Candle, CandleSource, Interval, QuoteError};
use crate::news::keywords::NameSource;

const DEFAULT_ENDPOINT: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// HTTP client for the Yahoo chart endpoint.
///
/// Serves two concerns: OHLC candles for the price adapter and the quoted
/// long name used to build news search keywords (both live in the same
/// chart payload, so no second endpoint is needed).
#[derive(Clone)]
pub struct YahooChartClient {
    http: Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn new() -> Result<Self, QuoteError> {
        Self::with_base_url(DEFAULT_ENDPOINT.to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, QuoteError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(concat!("stock-alerts/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url })
    }

    #[instrument(skip(self), fields(interval = interval.code()), level = "debug")]
    async fn fetch_chart(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<ChartResult, QuoteError> {
        let url = format!("{}/{}", self.base_url, symbol);

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("range", "1d"),
                ("interval", interval.code()),
                ("includePrePost", "false"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let envelope: ChartEnvelope = resp.json().await?;

        envelope
            .chart
            .result
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| QuoteError::InvalidResponse {
                symbol: symbol.to_string(),
                detail: "empty chart result".to_string(),
            })
    }
}

#[async_trait]
impl CandleSource for YahooChartClient {
    async fn candles(&self, symbol: &str, interval: Interval) -> Result<Vec<Candle>, QuoteError> {
        let chart = self.fetch_chart(symbol, interval).await?;
        let candles = chart.into_candles();
        debug!(symbol, interval = interval.code(), rows = candles.len(), "chart fetched");
        Ok(candles)
    }
}

#[async_trait]
impl NameSource for YahooChartClient {
    /// Best-effort: any failure degrades to `None` and the caller falls
    /// back to ticker-derived keywords.
    async fn long_name(&self, symbol: &str) -> Option<String> {
        match self.fetch_chart(symbol, Interval::Daily).await {
            Ok(chart) => chart.meta.long_name.or(chart.meta.short_name),
            Err(e) => {
                debug!(symbol, error = %e, "long name lookup failed");
                None
            }
        }
    }
}

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize, Default)]
struct ChartMeta {
    #[serde(default, rename = "longName")]
    long_name: Option<String>,
    #[serde(default, rename = "shortName")]
    short_name: Option<String>,
}

#[derive(Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Deserialize, Default)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResult {
    /// Zips the parallel timestamp/open/close arrays into candles.
    /// Slots the provider nulls out stay `None`; rows without a valid
    /// timestamp are dropped.
    fn into_candles(self) -> Vec<Candle> {
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();

        self.timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let ts = DateTime::from_timestamp(ts, 0)?;
                Some(Candle {
                    ts,
                    open: quote.open.get(i).copied().flatten(),
                    close: quote.close.get(i).copied().flatten(),
                })
            })
            .collect()
    }
}
