use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::crawler::{DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_PAGES};
use crate::state::AnalysisProgress;

/// Receives progress snapshots on the analyzer's own task
///
/// Implementations must return quickly; delivery is best-effort.
pub type ProgressCallback = Arc<dyn Fn(&AnalysisProgress) + Send + Sync>;

/// Tunables for the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    /// Normalizations scoring below this are never persisted
    pub confidence_floor: f64,
    pub lookback_days: i64,
    /// Emit a progress event every this many records while saving
    pub progress_every: usize,
    /// Page budget used when the caller passes 0
    pub default_max_pages: u32,
    /// Digest of the configuration, stored on each run record
    pub config_hash: Option<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            confidence_floor: 0.3,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            progress_every: 50,
            default_max_pages: DEFAULT_MAX_PAGES,
            config_hash: None,
        }
    }
}

/// Per-call options for [`Analyzer::run`](super::Analyzer::run)
#[derive(Clone, Default)]
pub struct AnalyzeOptions {
    pub query: String,
    pub category: Option<String>,
    /// 0 selects the configured default
    pub max_pages: u32,
    pub on_progress: Option<ProgressCallback>,
}

impl AnalyzeOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

impl fmt::Debug for AnalyzeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzeOptions")
            .field("query", &self.query)
            .field("category", &self.category)
            .field("max_pages", &self.max_pages)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub run_id: String,
    pub products_count: usize,
    pub sales_count: usize,
    pub pages_scraped: u32,
    /// Pages that failed after all retries
    pub page_errors: usize,
    pub duration: Duration,
}
