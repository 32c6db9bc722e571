use std::sync::Arc;

use anyhow::Context;
use tracing::Instrument;

use stock_alerts::{
    config::AppConfig,
    cycle::{Collaborators, CycleOutcome, MonitorCycle},
    logger::{RunId, init_tracing, run_span},
    market::{adapter::PriceAdapter, hours::MarketHours, yahoo::YahooChartClient},
    news::GoogleNewsClient,
    news::keywords::CompanyCache,
    notify::NtfyNotifier,
    state::AlertStateStore,
    util::mask_secret,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_tracing(&cfg.log.level, cfg.log.json);
    let run_id = RunId::generate();

    tracing::info!(
        config = %config_path,
        tickers = ?cfg.tickers,
        threshold_pct = cfg.threshold_pct,
        ntfy_server = %cfg.ntfy.server,
        ntfy_topic = %mask_secret(&cfg.ntfy.topic, 2),
        news_enabled = cfg.news.enabled,
        dry_run = cfg.test.dry_run,
        "configuration loaded"
    );

    let market_hours = if cfg.market_hours.enabled {
        Some(MarketHours::from_config(&cfg.market_hours)?)
    } else {
        None
    };

    let yahoo = Arc::new(YahooChartClient::new().context("build chart client")?);

    let collab = Collaborators {
        prices: Arc::new(PriceAdapter::new(yahoo.clone())),
        news: Arc::new(
            GoogleNewsClient::new(&cfg.news.lang, &cfg.news.country)
                .context("build news client")?,
        ),
        names: yahoo,
        notifier: Arc::new(
            NtfyNotifier::new(&cfg.ntfy.server, &cfg.ntfy.topic).context("build notifier")?,
        ),
        company_cache: Arc::new(CompanyCache::open(&cfg.company_cache_file)),
    };

    let cycle = MonitorCycle::new(
        collab,
        AlertStateStore::new(&cfg.state_file),
        cfg.threshold_pct,
        market_hours,
        cfg.news.clone(),
        cfg.test.clone(),
    );

    let reports = cycle
        .run(&cfg.tickers, chrono::Utc::now())
        .instrument(run_span(&run_id))
        .await
        .context("monitoring cycle failed")?;

    for report in &reports {
        tracing::info!(symbol = %report.symbol, outcome = ?report.outcome, "cycle result");
    }

    let failed = reports
        .iter()
        .filter(|r| matches!(r.outcome, CycleOutcome::Failed(_)))
        .count();
    if failed > 0 {
        tracing::warn!(failed, total = reports.len(), "run finished with per-instrument failures");
    }

    Ok(())
}
