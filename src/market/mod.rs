pub mod adapter;
pub mod hours;
pub mod yahoo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Candle sampling granularity. Finer intervals give a materially fresher
/// "last price" when available; `Daily` exists only as the final fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interval {
    Intraday1m,
    Intraday5m,
    Intraday15m,
    Daily,
}

impl Interval {
    /// Intraday intervals in fallback order, finest first.
    pub const INTRADAY: [Interval; 3] = [
        Interval::Intraday1m,
        Interval::Intraday5m,
        Interval::Intraday15m,
    ];

    /// Wire code used by the chart provider.
    pub fn code(self) -> &'static str {
        match self {
            Interval::Intraday1m => "1m",
            Interval::Intraday5m => "5m",
            Interval::Intraday15m => "15m",
            Interval::Daily => "1d",
        }
    }
}

/// One OHLC sample as returned by the candle provider. Open/close may be
/// missing for individual slots; consumers skip the gaps.
#[derive(Clone, Copy, Debug)]
pub struct Candle {
    pub ts: DateTime<Utc>,
    pub open: Option<f64>,
    pub close: Option<f64>,
}

/// Today's opening price and the latest traded price for one instrument.
/// Produced fresh each cycle, never cached across runs.
#[derive(Clone, Copy, Debug)]
pub struct PriceSample {
    pub open_today: f64,
    pub last_price: f64,
    pub as_of: DateTime<Utc>,
    pub source_interval: Interval,
}

impl PriceSample {
    pub fn percent_change(&self) -> f64 {
        (self.last_price - self.open_today) / self.open_today * 100.0
    }
}

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed chart response for {symbol}: {detail}")]
    InvalidResponse { symbol: String, detail: String },

    #[error("no price data available for {symbol}")]
    DataUnavailable { symbol: String },
}

/// Raw candle retrieval for one symbol at one interval. A single network
/// call with no retry; `PriceAdapter` owns retries and interval fallback.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn candles(&self, symbol: &str, interval: Interval) -> Result<Vec<Candle>, QuoteError>;
}

/// Orchestrator-facing price retrieval.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn open_and_last(&self, symbol: &str) -> Result<PriceSample, QuoteError>;
}
