use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::{ConfigError, MarketHoursConfig};

/// Trading-hours gate for one exchange timezone.
///
/// Holidays and half-days are deliberately not modeled; the gate only
/// restricts evaluation to the configured weekday window.
#[derive(Clone, Debug)]
pub struct MarketHours {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
    weekdays_only: bool,
}

impl MarketHours {
    pub fn from_config(cfg: &MarketHoursConfig) -> Result<Self, ConfigError> {
        let tz: Tz = cfg.timezone.parse().map_err(|_| {
            ConfigError::Invalid(format!("unknown timezone {:?}", cfg.timezone))
        })?;
        let open = parse_hhmm(&cfg.open)?;
        let close = parse_hhmm(&cfg.close)?;
        if open >= close {
            return Err(ConfigError::Invalid(format!(
                "market open {} must be before close {}",
                cfg.open, cfg.close
            )));
        }

        Ok(Self {
            tz,
            open,
            close,
            weekdays_only: cfg.weekdays_only,
        })
    }

    /// Whether `now` falls inside the trading window. Both window ends are
    /// inclusive.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);

        if self.weekdays_only && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let t = local.time();
        t >= self.open && t <= self.close
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| ConfigError::Invalid(format!("invalid time of day {s:?}, expected HH:MM")))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn nyse() -> MarketHours {
        MarketHours::from_config(&MarketHoursConfig {
            enabled: true,
            timezone: "America/New_York".to_string(),
            open: "09:30".to_string(),
            close: "16:00".to_string(),
            weekdays_only: true,
        })
        .unwrap()
    }

    #[test]
    fn saturday_is_closed_regardless_of_time() {
        // 2024-01-06 is a Saturday; 15:00 UTC = 10:00 in New York.
        let now = Utc.with_ymd_and_hms(2024, 1, 6, 15, 0, 0).unwrap();
        assert!(!nyse().is_open(now));
    }

    #[test]
    fn weekday_inside_window_is_open() {
        // 2024-01-08 is a Monday; 15:00 UTC = 10:00 EST.
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap();
        assert!(nyse().is_open(now));
    }

    #[test]
    fn weekday_before_open_is_closed() {
        // 13:00 UTC = 08:00 EST.
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 13, 0, 0).unwrap();
        assert!(!nyse().is_open(now));
    }

    #[test]
    fn window_ends_are_inclusive() {
        // 14:30 UTC = 09:30 EST, 21:00 UTC = 16:00 EST.
        let open_edge = Utc.with_ymd_and_hms(2024, 1, 8, 14, 30, 0).unwrap();
        let close_edge = Utc.with_ymd_and_hms(2024, 1, 8, 21, 0, 0).unwrap();
        assert!(nyse().is_open(open_edge));
        assert!(nyse().is_open(close_edge));

        let past_close = Utc.with_ymd_and_hms(2024, 1, 8, 21, 0, 1).unwrap();
        assert!(!nyse().is_open(past_close));
    }

    #[test]
    fn weekend_allowed_when_weekdays_only_disabled() {
        let gate = MarketHours::from_config(&MarketHoursConfig {
            enabled: true,
            timezone: "Europe/Berlin".to_string(),
            open: "08:00".to_string(),
            close: "22:00".to_string(),
            weekdays_only: false,
        })
        .unwrap();

        // 2024-01-06 is a Saturday; 15:00 UTC = 16:00 in Berlin.
        let now = Utc.with_ymd_and_hms(2024, 1, 6, 15, 0, 0).unwrap();
        assert!(gate.is_open(now));
    }

    #[test]
    fn open_after_close_is_rejected() {
        let err = MarketHours::from_config(&MarketHoursConfig {
            enabled: true,
            timezone: "America/New_York".to_string(),
            open: "16:00".to_string(),
            close: "09:30".to_string(),
            weekdays_only: true,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
