//! Monitoring-cycle orchestrator.
//!
//! Responsibilities:
//! - evaluate the market-hours gate per instrument
//! - retrieve prices and compute the percent move vs today's open
//! - guarantee at most one notification per direction per session (dedup)
//! - isolate per-instrument failures so one bad symbol never aborts the batch
//! - persist the alert state exactly once, after the whole batch
//!
//! Non-responsibilities:
//! - retry/fallback across candle intervals (`PriceAdapter` owns that)
//! - day rollover of the alert state: nothing here resets a stored
//!   direction at the start of a new trading day. An instrument that
//!   alerted Up stays deduped until the direction flips or an external
//!   mechanism clears the state file.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::{NewsConfig, TestConfig};
use crate::error::CycleError;
use crate::market::hours::MarketHours;
use crate::market::{PriceSample, PriceSource};
use crate::news::keywords::{CompanyCache, NameSource, auto_keywords};
use crate::news::{Headline, NewsProvider, build_query, filter_titles};
use crate::notify::{DeliveryError, NotifyOptions, PushNotifier};
use crate::state::{AlertState, AlertStateStore, Direction};

/// Per-instrument result of one run. Produced for logging and tests, not
/// persisted.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    NoMove,
    AlertedUp,
    AlertedDown,
    AlreadyAlerted,
    SkippedMarketClosed,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct CycleReport {
    pub symbol: String,
    pub outcome: CycleOutcome,
}

/// External collaborators of the orchestrator, injected as trait objects
/// so tests can substitute each one independently.
pub struct Collaborators {
    pub prices: Arc<dyn PriceSource>,
    pub news: Arc<dyn NewsProvider>,
    pub names: Arc<dyn NameSource>,
    pub notifier: Arc<dyn PushNotifier>,
    pub company_cache: Arc<CompanyCache>,
}

pub struct MonitorCycle {
    collab: Collaborators,
    store: AlertStateStore,
    threshold_pct: f64,
    /// `None` when the gate is disabled in config.
    market_hours: Option<MarketHours>,
    news_cfg: NewsConfig,
    test_cfg: TestConfig,
    deadline: Option<Duration>,
}

impl MonitorCycle {
    pub fn new(
        collab: Collaborators,
        store: AlertStateStore,
        threshold_pct: f64,
        market_hours: Option<MarketHours>,
        news_cfg: NewsConfig,
        test_cfg: TestConfig,
    ) -> Self {
        Self {
            collab,
            store,
            threshold_pct,
            market_hours,
            news_cfg,
            test_cfg,
            deadline: None,
        }
    }

    /// Overall wall-clock budget for the run. Instruments that do not
    /// finish inside it are reported as `Failed("timeout")`; completed
    /// ones keep their results and the state is still persisted.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Runs one monitoring cycle over `symbols`, sequentially.
    ///
    /// `now` is injected by the caller (one timestamp per run) so the gate
    /// decision is deterministic and testable.
    ///
    /// Only a state-persist failure aborts with `Err`; everything
    /// per-instrument lands in the returned reports.
    #[instrument(skip(self, symbols), fields(instruments = symbols.len()))]
    pub async fn run(
        &self,
        symbols: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<CycleReport>, CycleError> {
        let mut state = self.store.load();
        let mut reports = Vec::with_capacity(symbols.len());
        let deadline = self.deadline.map(|d| tokio::time::Instant::now() + d);

        for symbol in symbols {
            let outcome = match deadline {
                None => self.process_one(symbol, now, &mut state).await,
                Some(at) => {
                    if tokio::time::Instant::now() >= at {
                        CycleOutcome::Failed("timeout".to_string())
                    } else {
                        match tokio::time::timeout_at(at, self.process_one(symbol, now, &mut state))
                            .await
                        {
                            Ok(outcome) => outcome,
                            Err(_) => CycleOutcome::Failed("timeout".to_string()),
                        }
                    }
                }
            };

            match &outcome {
                CycleOutcome::Failed(reason) => {
                    warn!(symbol = %symbol, reason = %reason, "instrument failed this cycle");
                }
                outcome => {
                    info!(symbol = %symbol, ?outcome, "instrument evaluated");
                }
            }
            reports.push(CycleReport {
                symbol: symbol.clone(),
                outcome,
            });
        }

        // One write per run; per-instrument writes would race a crash into
        // a partial file.
        self.store.save(&state).map_err(CycleError::StatePersist)?;

        Ok(reports)
    }

    async fn process_one(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        state: &mut AlertState,
    ) -> CycleOutcome {
        if let Some(hours) = &self.market_hours {
            if !self.test_cfg.bypass_market_hours && !hours.is_open(now) {
                debug!(symbol, "market closed; skipping");
                return CycleOutcome::SkippedMarketClosed;
            }
        }

        let sample = match self.collab.prices.open_and_last(symbol).await {
            Ok(sample) => sample,
            Err(e) => return CycleOutcome::Failed(e.to_string()),
        };

        let pct = if self.test_cfg.enabled && self.test_cfg.simulate_change {
            debug!(symbol, forced = self.test_cfg.force_delta_pct, "simulated percent change");
            self.test_cfg.force_delta_pct
        } else {
            sample.percent_change()
        };

        let direction = if pct >= self.threshold_pct {
            Direction::Up
        } else if pct <= -self.threshold_pct {
            Direction::Down
        } else {
            Direction::None
        };

        let previous = state.get(symbol).copied().unwrap_or_default();

        if direction == Direction::None {
            debug!(symbol, pct, "move below threshold");
            return CycleOutcome::NoMove;
        }
        if direction == previous {
            debug!(symbol, ?direction, "already alerted in this direction");
            return CycleOutcome::AlreadyAlerted;
        }

        match self.send_alert(symbol, &sample, pct, direction).await {
            Ok(()) => {
                // Persist-on-success policy: a failed delivery leaves the
                // stored direction untouched so the alert re-fires on the
                // next run.
                state.insert(symbol.to_string(), direction);
                match direction {
                    Direction::Up => CycleOutcome::AlertedUp,
                    _ => CycleOutcome::AlertedDown,
                }
            }
            Err(e) => {
                warn!(symbol, error = %e, "delivery failed; alert state unchanged");
                CycleOutcome::Failed(e.to_string())
            }
        }
    }

    async fn send_alert(
        &self,
        symbol: &str,
        sample: &PriceSample,
        pct: f64,
        direction: Direction,
    ) -> Result<(), DeliveryError> {
        let headlines = if self.news_cfg.enabled {
            self.collect_headlines(symbol).await
        } else {
            Vec::new()
        };

        let arrow = match direction {
            Direction::Up => "📈",
            _ => "📉",
        };

        let title = format!("Stock Alert: {symbol}");
        let mut message = format!(
            "{symbol} {arrow} {pct:+.1}% today (open {:.2}, last {:.2}, {})",
            sample.open_today,
            sample.last_price,
            sample.source_interval.code(),
        );
        for headline in &headlines {
            message.push_str("\n- ");
            message.push_str(&headline.title);
            if !headline.source.is_empty() {
                message.push_str(&format!(" ({})", headline.source));
            }
        }

        let opts = NotifyOptions {
            dry_run: self.test_cfg.dry_run,
            markdown: !headlines.is_empty(),
            click_url: Some(format!("https://finance.yahoo.com/quote/{symbol}")),
        };

        self.collab.notifier.notify(&title, &message, &opts).await
    }

    /// Best-effort enrichment: every step here degrades to "no headlines"
    /// rather than blocking the alert.
    async fn collect_headlines(&self, symbol: &str) -> Vec<Headline> {
        let (display, keywords) = auto_keywords(
            symbol,
            &self.collab.company_cache,
            self.collab.names.as_ref(),
        )
        .await;

        let query = build_query(&display, symbol);
        let items = self
            .collab
            .news
            .headlines(&query, self.news_cfg.limit, self.news_cfg.lookback_hours)
            .await;

        let matched = filter_titles(items, &keywords);
        debug!(symbol, query, matched = matched.len(), "headline enrichment");
        matched
    }
}
