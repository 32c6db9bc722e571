pub mod keywords;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// One recent news entry attached to an alert.
#[derive(Clone, Debug, PartialEq)]
pub struct Headline {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Parse(#[from] quick_xml::DeError),
}

/// Headline retrieval for one search query.
///
/// Soft-failing by contract: any transport or parse problem degrades to an
/// empty list so an alert is never blocked on enrichment.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn headlines(&self, query: &str, limit: usize, lookback_hours: u32) -> Vec<Headline>;
}

const FINANCE_TERMS: [&str; 7] = [
    "stock",
    "shares",
    "earnings",
    "analyst",
    "forecast",
    "upgrade",
    "downgrade",
];

/// Search query for one company, biased toward finance coverage to cut
/// noise from unrelated results.
pub fn build_query(name: &str, ticker: &str) -> String {
    format!("{} {} ({})", name, ticker, FINANCE_TERMS.join(" OR "))
}

/// Keeps entries whose title contains any required keyword
/// (case-insensitive substring). An empty keyword set keeps everything.
pub fn filter_titles(items: Vec<Headline>, required_keywords: &[String]) -> Vec<Headline> {
    let req: Vec<String> = required_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    if req.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| {
            let title = item.title.to_lowercase();
            req.iter().any(|k| title.contains(k))
        })
        .collect()
}

/// Google News RSS client.
pub struct GoogleNewsClient {
    http: Client,
    base_url: String,
    lang: String,
    country: String,
}

impl GoogleNewsClient {
    pub fn new(lang: &str, country: &str) -> Result<Self, NewsError> {
        Self::with_base_url("https://news.google.com".to_string(), lang, country)
    }

    pub fn with_base_url(base_url: String, lang: &str, country: &str) -> Result<Self, NewsError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("stock-alerts/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            lang: lang.to_string(),
            country: country.to_string(),
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch(
        &self,
        query: &str,
        limit: usize,
        lookback_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Headline>, NewsError> {
        // `when:` narrows the result window server-side; the publish
        // timestamps are still re-checked client-side below.
        let hinted = format!("{query} when:{lookback_hours}h");
        let ceid = format!("{}:{}", self.country, self.lang);

        let resp = self
            .http
            .get(format!("{}/rss/search", self.base_url))
            .query(&[
                ("q", hinted.as_str()),
                ("hl", self.lang.as_str()),
                ("gl", self.country.as_str()),
                ("ceid", ceid.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = resp.text().await?;
        let items = parse_feed(&body)?;
        Ok(collect_recent(items, limit, lookback_hours, now))
    }
}

#[async_trait]
impl NewsProvider for GoogleNewsClient {
    async fn headlines(&self, query: &str, limit: usize, lookback_hours: u32) -> Vec<Headline> {
        match self.fetch(query, limit, lookback_hours, Utc::now()).await {
            Ok(items) => {
                debug!(query, found = items.len(), "headlines fetched");
                items
            }
            Err(e) => {
                warn!(query, error = %e, "news fetch failed; continuing without headlines");
                Vec::new()
            }
        }
    }
}

fn parse_feed(xml: &str) -> Result<Vec<Headline>, NewsError> {
    let rss: Rss = quick_xml::de::from_str(xml)?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|item| Headline {
            title: item.title.unwrap_or_default().trim().to_string(),
            link: item.link.unwrap_or_default().trim().to_string(),
            source: item.source.and_then(|s| s.name).unwrap_or_default(),
            published: item
                .pub_date
                .and_then(|d| DateTime::parse_from_rfc2822(&d).ok())
                .map(|d| d.with_timezone(&Utc)),
        })
        .collect())
}

/// Client-side recency re-check on top of the server-side `when:` hint.
/// Entries without a parseable timestamp are kept. Stops once `limit`
/// items are collected.
fn collect_recent(
    items: Vec<Headline>,
    limit: usize,
    lookback_hours: u32,
    now: DateTime<Utc>,
) -> Vec<Headline> {
    let cutoff = now - chrono::Duration::hours(lookback_hours as i64);
    let mut out = Vec::new();

    for item in items {
        if let Some(published) = item.published {
            if published < cutoff {
                continue;
            }
        }
        out.push(item);
        if out.len() >= limit {
            break;
        }
    }
    out
}

#[derive(Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Deserialize)]
struct RssChannel {
    #[serde(default, rename = "item")]
    items: Vec<RssItem>,
}

#[derive(Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default, rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(default)]
    source: Option<RssSource>,
}

#[derive(Deserialize)]
struct RssSource {
    #[serde(default, rename = "$text")]
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>"Apple AAPL" - Google News</title>
    <item>
      <title>Apple stock climbs after earnings beat</title>
      <link>https://example.com/a</link>
      <pubDate>Mon, 08 Jan 2024 14:00:00 GMT</pubDate>
      <source url="https://example.com">Example Wire</source>
    </item>
    <item>
      <title>Analyst upgrades Apple to buy</title>
      <link>https://example.com/b</link>
      <pubDate>Mon, 08 Jan 2024 02:00:00 GMT</pubDate>
      <source url="https://example.org">Other Wire</source>
    </item>
    <item>
      <title>Fruit growers report record harvest</title>
      <link>https://example.com/c</link>
    </item>
  </channel>
</rss>"#;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap()
    }

    #[test]
    fn query_combines_name_ticker_and_finance_terms() {
        let q = build_query("Microsoft", "MSFT");
        assert_eq!(
            q,
            "Microsoft MSFT (stock OR shares OR earnings OR analyst OR forecast OR upgrade OR downgrade)"
        );
    }

    #[test]
    fn feed_parses_titles_sources_and_dates() {
        let items = parse_feed(FEED).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Apple stock climbs after earnings beat");
        assert_eq!(items[0].source, "Example Wire");
        assert!(items[0].published.is_some());
        assert!(items[2].published.is_none());
    }

    #[test]
    fn stale_entries_are_dropped_client_side() {
        let items = parse_feed(FEED).unwrap();
        // 12h window at 15:00: the 02:00 entry is out, the dateless one stays.
        let recent = collect_recent(items, 10, 12, fixed_now());
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].title, "Apple stock climbs after earnings beat");
        assert_eq!(recent[1].title, "Fruit growers report record harvest");
    }

    #[test]
    fn limit_caps_collected_entries() {
        let items = parse_feed(FEED).unwrap();
        let recent = collect_recent(items, 1, 48, fixed_now());
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn title_filter_is_case_insensitive_substring() {
        let items = parse_feed(FEED).unwrap();
        let keywords = vec!["apple".to_string(), "AAPL".to_string()];
        let matched = filter_titles(items, &keywords);
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|h| h.title.to_lowercase().contains("apple")));
    }

    #[test]
    fn empty_keyword_set_keeps_everything() {
        let items = parse_feed(FEED).unwrap();
        let len = items.len();
        assert_eq!(filter_titles(items, &[]).len(), len);
    }

    #[test]
    fn malformed_feed_is_a_parse_error() {
        assert!(matches!(parse_feed("<rss><garbage"), Err(NewsError::Parse(_))));
    }
}
