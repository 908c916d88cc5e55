use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Pages fetched when the caller gives no budget
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Lookback window applied when the caller gives no cutoff
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// One completed sale scraped from a results page
#[derive(Debug, Clone, PartialEq)]
pub struct RawSale {
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub sold_at: DateTime<Utc>,
    /// Canonical listing URL, used for deduplication
    pub url: Option<String>,
    pub platform: String,
    /// Free-form listing details such as `condition` and `shipping`
    pub metadata: BTreeMap<String, String>,
}

/// Parameters for one crawl session
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub query: String,
    /// Filter token such as "display" or "etb"
    pub category: Option<String>,
    /// Page budget; 0 selects [`DEFAULT_MAX_PAGES`]
    pub max_pages: u32,
    /// Oldest sale kept; None selects [`DEFAULT_LOOKBACK_DAYS`] before now
    pub since: Option<DateTime<Utc>>,
}

impl ScrapeOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn effective_max_pages(&self) -> u32 {
        if self.max_pages == 0 {
            DEFAULT_MAX_PAGES
        } else {
            self.max_pages
        }
    }

    pub fn effective_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.since
            .unwrap_or_else(|| now - chrono::Duration::days(DEFAULT_LOOKBACK_DAYS))
    }
}

/// A page that failed after all retries
#[derive(Debug, Clone, PartialEq)]
pub struct PageError {
    pub page: u32,
    pub message: String,
}

/// Everything one crawl session collected
#[derive(Debug, Clone, Default)]
pub struct ScrapeResult {
    pub sales: Vec<RawSale>,
    pub pages_scraped: u32,
    pub duration: Duration,
    /// Non-fatal page failures, in page order
    pub errors: Vec<PageError>,
}

impl ScrapeResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Outcome of a single reachability probe
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub target: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}
