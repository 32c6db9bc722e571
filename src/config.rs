use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Application configuration.
///
/// Every recognized option is enumerated here with its default; unknown
/// keys are rejected at load time so a typo in the config file fails fast
/// instead of silently falling back to a default.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,

    /// Instrument symbols to monitor, e.g. "AAPL", "SAP.DE", "^GDAXI".
    /// Normalized to uppercase on load.
    pub tickers: Vec<String>,

    /// Intraday move (percent vs today's open) that triggers an alert.
    pub threshold_pct: f64,

    pub ntfy: NtfyConfig,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde(default = "default_company_cache_file")]
    pub company_cache_file: PathBuf,

    #[serde(default)]
    pub market_hours: MarketHoursConfig,

    #[serde(default)]
    pub test: TestConfig,

    #[serde(default)]
    pub news: NewsConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NtfyConfig {
    #[serde(default = "default_ntfy_server")]
    pub server: String,

    /// Shared-secret topic string. Never logged unmasked.
    #[serde(default)]
    pub topic: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketHoursConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// IANA timezone name, e.g. "America/New_York".
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Local open time, "HH:MM".
    #[serde(default = "default_open")]
    pub open: String,

    /// Local close time, "HH:MM".
    #[serde(default = "default_close")]
    pub close: String,

    #[serde(default = "default_true")]
    pub weekdays_only: bool,
}

impl Default for MarketHoursConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: default_timezone(),
            open: default_open(),
            close: default_close(),
            weekdays_only: true,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Evaluate instruments even outside configured trading hours.
    #[serde(default)]
    pub bypass_market_hours: bool,

    /// Percent change substituted for the computed one when
    /// `enabled && simulate_change`.
    #[serde(default)]
    pub force_delta_pct: f64,

    /// Log the notification instead of delivering it.
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub simulate_change: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of headlines attached to one alert.
    #[serde(default = "default_news_limit")]
    pub limit: usize,

    /// Recency window applied both server-side (query hint) and
    /// client-side (publish timestamp re-check).
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,

    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default = "default_country")]
    pub country: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: default_news_limit(),
            lookback_hours: default_lookback_hours(),
            lang: default_lang(),
            country: default_country(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ntfy_server() -> String {
    "https://ntfy.sh".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_company_cache_file() -> PathBuf {
    PathBuf::from("company_cache.json")
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_open() -> String {
    "09:30".to_string()
}

fn default_close() -> String {
    "16:00".to_string()
}

fn default_true() -> bool {
    true
}

fn default_news_limit() -> usize {
    3
}

fn default_lookback_hours() -> u32 {
    12
}

fn default_lang() -> String {
    "de".to_string()
}

fn default_country() -> String {
    "DE".to_string()
}

impl AppConfig {
    /// Reads, parses and validates the config file in one step.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg: AppConfig = serde_json::from_str(&raw)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    fn normalize(&mut self) {
        for ticker in &mut self.tickers {
            *ticker = ticker.trim().to_uppercase();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tickers.is_empty() {
            return Err(ConfigError::Invalid("tickers must not be empty".into()));
        }
        if self.tickers.iter().any(|t| t.is_empty()) {
            return Err(ConfigError::Invalid(
                "tickers must not contain empty symbols".into(),
            ));
        }
        if !self.threshold_pct.is_finite() || self.threshold_pct <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "threshold_pct must be a positive number, got {}",
                self.threshold_pct
            )));
        }
        if self.ntfy.server.trim().is_empty() {
            return Err(ConfigError::Invalid("ntfy.server must not be empty".into()));
        }
        if self.ntfy.topic.trim().is_empty() && !self.test.dry_run {
            return Err(ConfigError::Invalid(
                "ntfy.topic must be set unless test.dry_run is enabled".into(),
            ));
        }
        if self.market_hours.enabled {
            // Fails fast on unknown timezones or malformed HH:MM values.
            crate::market::hours::MarketHours::from_config(&self.market_hours)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<AppConfig, ConfigError> {
        let mut cfg: AppConfig = serde_json::from_str(raw)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    #[test]
    fn minimal_config_takes_defaults() {
        let cfg = parse(
            r#"{
                "tickers": ["aapl", " sap.de "],
                "threshold_pct": 2.5,
                "ntfy": { "topic": "secret-topic" }
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.tickers, vec!["AAPL", "SAP.DE"]);
        assert_eq!(cfg.ntfy.server, "https://ntfy.sh");
        assert_eq!(cfg.state_file, PathBuf::from("state.json"));
        assert!(cfg.market_hours.enabled);
        assert_eq!(cfg.market_hours.open, "09:30");
        assert_eq!(cfg.news.limit, 3);
        assert!(!cfg.test.dry_run);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse(
            r#"{
                "tickers": ["AAPL"],
                "threshold_pct": 2.5,
                "ntfy": { "topic": "t" },
                "treshold_pct": 3.0
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn empty_symbol_is_rejected_at_load() {
        let err = parse(
            r#"{
                "tickers": ["AAPL", "  "],
                "threshold_pct": 2.5,
                "ntfy": { "topic": "t" }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        for threshold in ["0.0", "-1.5"] {
            let raw = format!(
                r#"{{ "tickers": ["AAPL"], "threshold_pct": {threshold},
                     "ntfy": {{ "topic": "t" }} }}"#
            );
            assert!(matches!(parse(&raw), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn missing_topic_is_allowed_only_for_dry_run() {
        let raw = r#"{
            "tickers": ["AAPL"],
            "threshold_pct": 2.5,
            "ntfy": {},
            "test": { "enabled": true, "dry_run": true }
        }"#;
        assert!(parse(raw).is_ok());

        let raw = r#"{
            "tickers": ["AAPL"],
            "threshold_pct": 2.5,
            "ntfy": {}
        }"#;
        assert!(matches!(parse(raw), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let err = parse(
            r#"{
                "tickers": ["AAPL"],
                "threshold_pct": 2.5,
                "ntfy": { "topic": "t" },
                "market_hours": { "timezone": "Mars/Olympus_Mons" }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
