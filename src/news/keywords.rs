use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Best-effort long-name lookup for a symbol. `None` means the caller
/// falls back to ticker-derived keywords.
#[async_trait]
pub trait NameSource: Send + Sync {
    async fn long_name(&self, symbol: &str) -> Option<String>;
}

/// Resolved display metadata for one symbol.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompanyMeta {
    /// Full symbol, e.g. "SAP.DE".
    pub ticker: String,
    /// Cleaned company name without legal suffixes, e.g. "Apple".
    pub name: Option<String>,
    /// Name as reported by the provider, e.g. "Apple Inc.".
    pub raw_name: Option<String>,
    /// Where the name came from ("chart.meta" or "fallback").
    pub source: String,
    /// Symbol without exchange/class suffix, e.g. "SAP".
    pub base_ticker: String,
}

/// Common legal-form suffixes stripped from company names so keyword
/// matching works on the colloquial name ("Apple Inc." -> "Apple").
/// Compared after trimming trailing dots and commas.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc", "corp", "corporation", "ltd", "plc", "ag", "se", "nv", "sa", "s.a", "spa", "s.p.a",
    "oyj", "ab", "asa", "co", "company", "limited", "holdings", "holding", "llc", "llp", "kg",
    "kgaa",
];

pub fn strip_legal_suffixes(name: &str) -> String {
    let mut parts: Vec<String> = name
        .split_whitespace()
        .map(|p| p.trim_matches([',', '.']).to_string())
        .collect();

    while let Some(last) = parts.last() {
        if LEGAL_SUFFIXES.contains(&last.to_lowercase().as_str()) {
            parts.pop();
        } else {
            break;
        }
    }

    if parts.is_empty() {
        name.trim().to_string()
    } else {
        parts.join(" ")
    }
}

/// Base symbol without exchange or share-class suffix. Index symbols
/// (leading '^') are kept unchanged.
pub fn base_ticker(symbol: &str) -> String {
    if symbol.starts_with('^') {
        return symbol.to_string();
    }
    symbol
        .split(['.', '-'])
        .next()
        .unwrap_or(symbol)
        .to_string()
}

/// File-backed company metadata cache.
///
/// Passed by handle into whichever component builds news queries; there is
/// no module-level singleton. The file maps symbol -> `CompanyMeta`. Cache
/// writes are best-effort: a failed write only means a cold cache next run.
pub struct CompanyCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, CompanyMeta>>,
}

impl CompanyCache {
    /// Opens the cache, tolerating a missing or corrupt file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "company cache corrupt; starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<CompanyMeta> {
        self.entries.read().get(symbol).cloned()
    }

    pub fn insert(&self, meta: CompanyMeta) {
        let mut entries = self.entries.write();
        entries.insert(meta.ticker.clone(), meta);

        match serde_json::to_string_pretty(&*entries) {
            Ok(raw) => {
                if let Err(e) = fs::write(&self.path, raw) {
                    warn!(path = %self.path.display(), error = %e, "company cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "company cache encode failed"),
        }
    }
}

/// Resolves metadata for a symbol, consulting the cache first and the
/// name source only on a miss.
pub async fn company_meta(
    symbol: &str,
    cache: &CompanyCache,
    names: &dyn NameSource,
) -> CompanyMeta {
    if let Some(meta) = cache.get(symbol) {
        debug!(symbol, "company meta served from cache");
        return meta;
    }

    let raw_name = names.long_name(symbol).await;
    let (cleaned, source) = match &raw_name {
        Some(raw) => {
            let cleaned = strip_legal_suffixes(raw);
            if cleaned.is_empty() {
                (base_ticker(symbol), "fallback")
            } else {
                (cleaned, "chart.meta")
            }
        }
        None => (base_ticker(symbol), "fallback"),
    };

    let meta = CompanyMeta {
        ticker: symbol.to_string(),
        name: Some(cleaned),
        raw_name,
        source: source.to_string(),
        base_ticker: base_ticker(symbol),
    };
    cache.insert(meta.clone());
    meta
}

/// Display name plus the required-keyword set used to filter headline
/// titles: the display name, its individual words, the base ticker and the
/// full symbol, deduplicated in that order.
pub async fn auto_keywords(
    symbol: &str,
    cache: &CompanyCache,
    names: &dyn NameSource,
) -> (String, Vec<String>) {
    let meta = company_meta(symbol, cache, names).await;

    let display = meta
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            if meta.base_ticker.is_empty() {
                meta.ticker.clone()
            } else {
                meta.base_ticker.clone()
            }
        });

    fn push_unique(keywords: &mut Vec<String>, kw: &str) {
        if !kw.is_empty() && !keywords.iter().any(|k| k == kw) {
            keywords.push(kw.to_string());
        }
    }

    let mut keywords = Vec::new();
    push_unique(&mut keywords, &display);
    for word in display.split_whitespace() {
        push_unique(&mut keywords, word);
    }
    push_unique(&mut keywords, &meta.base_ticker);
    push_unique(&mut keywords, &meta.ticker);

    (display, keywords)
}
