use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::market::{Candle, CandleSource, Interval, PriceSample, PriceSource, QuoteError};

/// Bounded retry policy for one candle interval.
///
/// The upstream provider intermittently returns empty series at the edges
/// of market hours; a second try after a short delay absorbs most of
/// those. Injectable so tests run against paused time.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub tries_per_interval: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tries_per_interval: 2,
            retry_delay: Duration::from_millis(400),
        }
    }
}

/// Price retrieval with interval fallback: each intraday interval (finest
/// first) gets `tries_per_interval` attempts, then a single daily query.
/// Only when all of that is exhausted does the instrument count as
/// unavailable for this cycle.
pub struct PriceAdapter {
    source: Arc<dyn CandleSource>,
    policy: RetryPolicy,
}

impl PriceAdapter {
    pub fn new(source: Arc<dyn CandleSource>) -> Self {
        Self::with_policy(source, RetryPolicy::default())
    }

    pub fn with_policy(source: Arc<dyn CandleSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    async fn try_interval(&self, symbol: &str, interval: Interval) -> Option<PriceSample> {
        for attempt in 1..=self.policy.tries_per_interval {
            match self.source.candles(symbol, interval).await {
                Ok(candles) => {
                    if let Some(sample) = sample_from_candles(&candles, interval) {
                        return Some(sample);
                    }
                    debug!(symbol, interval = interval.code(), attempt, "empty candle series");
                }
                Err(e) => {
                    debug!(symbol, interval = interval.code(), attempt, error = %e, "candle fetch failed");
                }
            }
            if attempt < self.policy.tries_per_interval {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }
        None
    }
}

#[async_trait]
impl PriceSource for PriceAdapter {
    async fn open_and_last(&self, symbol: &str) -> Result<PriceSample, QuoteError> {
        for interval in Interval::INTRADAY {
            if let Some(sample) = self.try_interval(symbol, interval).await {
                debug!(
                    symbol,
                    interval = interval.code(),
                    open = sample.open_today,
                    last = sample.last_price,
                    "intraday sample"
                );
                return Ok(sample);
            }
        }

        // Outside market hours every intraday series comes back empty; a
        // daily query still carries the session's open and close.
        match self.source.candles(symbol, Interval::Daily).await {
            Ok(candles) => {
                if let Some(sample) = sample_from_candles(&candles, Interval::Daily) {
                    debug!(
                        symbol,
                        open = sample.open_today,
                        last = sample.last_price,
                        "daily fallback sample"
                    );
                    return Ok(sample);
                }
            }
            Err(e) => {
                debug!(symbol, error = %e, "daily fallback fetch failed");
            }
        }

        Err(QuoteError::DataUnavailable {
            symbol: symbol.to_string(),
        })
    }
}

/// Open = first non-null open of the day, last = most recent non-null
/// close. A non-positive open means the series is unusable.
fn sample_from_candles(candles: &[Candle], interval: Interval) -> Option<PriceSample> {
    let open_today = candles.iter().find_map(|c| c.open)?;
    if open_today <= 0.0 {
        return None;
    }
    let (as_of, last_price) = candles
        .iter()
        .rev()
        .find_map(|c| c.close.map(|price| (c.ts, price)))?;

    Some(PriceSample {
        open_today,
        last_price,
        as_of,
        source_interval: interval,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use chrono::Utc;
    use parking_lot::Mutex;

    /// Replays a scripted sequence of candle series, recording which
    /// interval each call asked for.
    struct ScriptedSource {
        script: Mutex<VecDeque<Vec<Candle>>>,
        calls: Mutex<Vec<Interval>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Vec<Candle>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Interval> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CandleSource for ScriptedSource {
        async fn candles(
            &self,
            _symbol: &str,
            interval: Interval,
        ) -> Result<Vec<Candle>, QuoteError> {
            self.calls.lock().push(interval);
            Ok(self.script.lock().pop_front().unwrap_or_default())
        }
    }

    fn candle(open: Option<f64>, close: Option<f64>) -> Candle {
        Candle {
            ts: Utc::now(),
            open,
            close,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_interval_success_needs_one_call() {
        let source = Arc::new(ScriptedSource::new(vec![vec![
            candle(Some(100.0), Some(101.0)),
            candle(Some(101.0), Some(105.0)),
        ]]));
        let adapter = PriceAdapter::new(source.clone());

        let sample = adapter.open_and_last("AAPL").await.unwrap();
        assert_eq!(sample.open_today, 100.0);
        assert_eq!(sample.last_price, 105.0);
        assert_eq!(sample.source_interval, Interval::Intraday1m);
        assert_eq!(source.calls(), vec![Interval::Intraday1m]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_intraday_falls_back_to_daily() {
        // Two tries per intraday interval, all empty, then the daily query.
        let mut script = vec![Vec::new(); 6];
        script.push(vec![candle(Some(100.0), Some(97.0))]);

        let source = Arc::new(ScriptedSource::new(script));
        let adapter = PriceAdapter::new(source.clone());

        let sample = adapter.open_and_last("SAP.DE").await.unwrap();
        assert_eq!(sample.source_interval, Interval::Daily);
        assert_eq!(sample.last_price, 97.0);
        assert_eq!(
            source.calls(),
            vec![
                Interval::Intraday1m,
                Interval::Intraday1m,
                Interval::Intraday5m,
                Interval::Intraday5m,
                Interval::Intraday15m,
                Interval::Intraday15m,
                Interval::Daily,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn everything_empty_is_data_unavailable() {
        let source = Arc::new(ScriptedSource::new(Vec::new()));
        let adapter = PriceAdapter::new(source);

        let err = adapter.open_and_last("GHOST").await.unwrap_err();
        assert!(matches!(err, QuoteError::DataUnavailable { symbol } if symbol == "GHOST"));
    }

    #[tokio::test(start_paused = true)]
    async fn non_positive_open_counts_as_unavailable() {
        let bad = vec![candle(Some(0.0), Some(100.0))];
        let source = Arc::new(ScriptedSource::new(vec![bad; 7]));
        let adapter = PriceAdapter::new(source);

        assert!(adapter.open_and_last("ZERO").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_on_second_try() {
        let source = Arc::new(ScriptedSource::new(vec![
            Vec::new(),
            vec![candle(Some(50.0), Some(51.0))],
        ]));
        let adapter = PriceAdapter::new(source.clone());

        let sample = adapter.open_and_last("AAPL").await.unwrap();
        assert_eq!(sample.source_interval, Interval::Intraday1m);
        assert_eq!(
            source.calls(),
            vec![Interval::Intraday1m, Interval::Intraday1m]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn null_open_slots_are_skipped() {
        let source = Arc::new(ScriptedSource::new(vec![vec![
            candle(None, None),
            candle(Some(200.0), Some(202.0)),
            candle(None, None),
        ]]));
        let adapter = PriceAdapter::new(source);

        let sample = adapter.open_and_last("MSFT").await.unwrap();
        assert_eq!(sample.open_today, 200.0);
        assert_eq!(sample.last_price, 202.0);
    }
}
