use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::analyzer::AnalyzerSettings;
use crate::crawler::{ScraperSettings, DEFAULT_BASE_URL, DEFAULT_USER_AGENTS};
use crate::normalizer::{Normalizer, ScoringConfig};
use crate::throttle::RetryConfig;
use crate::url::HostAllowList;
use crate::{ConfigError, ConfigResult};

/// Main configuration structure for Resale-Scout
///
/// Every section except `[output]` may be omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

/// Target site and request pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScraperConfig {
    pub base_url: String,

    /// Host patterns requests may reach (e.g., "www.ebay.fr" or "*.ebay.fr")
    pub allowed_hosts: Vec<String>,

    /// Identity pool; one is picked at random per session
    pub user_agents: Vec<String>,

    /// Minimum time between page requests (milliseconds)
    pub rate_limit_ms: u64,

    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,

    /// Token-bucket capacity; set together with `burst-refill-per-sec`
    pub burst_max: Option<u32>,
    pub burst_refill_per_sec: Option<f64>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            allowed_hosts: vec!["www.ebay.fr".to_string(), "ebay.fr".to_string()],
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            rate_limit_ms: 2000,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            burst_max: None,
            burst_refill_per_sec: None,
        }
    }
}

/// Retry policy for page fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetrySection {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

/// Heuristic scoring constants for title recognition
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NormalizerConfig {
    pub set_weight: f64,
    pub type_weight: f64,
    pub pattern_ceiling: f64,
    pub generic_base: f64,
    pub generic_category: f64,
    pub set_bonus: f64,

    /// Added to the built-in exclusion keywords
    pub extra_exclusions: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let scoring = ScoringConfig::default();
        Self {
            set_weight: scoring.set_weight,
            type_weight: scoring.type_weight,
            pattern_ceiling: scoring.pattern_ceiling,
            generic_base: scoring.generic_base,
            generic_category: scoring.generic_category,
            set_bonus: scoring.set_bonus,
            extra_exclusions: Vec::new(),
        }
    }
}

/// Run-level behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnalysisConfig {
    /// Query used when none is given on the command line
    pub default_query: Option<String>,
    pub max_pages: u32,
    pub lookback_days: i64,
    pub confidence_floor: f64,
    pub progress_every: usize,

    /// Runs left `running` longer than this are failed at startup
    pub stale_run_minutes: i64,

    /// Whole-run deadline in seconds; 0 disables it
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_query: None,
            max_pages: 10,
            lookback_days: 30,
            confidence_floor: 0.3,
            progress_every: 50,
            stale_run_minutes: 30,
            timeout_secs: 600,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Path to the markdown report file
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

fn default_report_path() -> String {
    "./report.md".to_string()
}

impl Config {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_factor: self.retry.backoff_factor,
            jitter: self.retry.jitter,
        }
    }

    /// Builds crawler settings from `[scraper]` and `[retry]`
    pub fn scraper_settings(&self) -> ConfigResult<ScraperSettings> {
        let base_url = Url::parse(&self.scraper.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("base-url '{}': {}", self.scraper.base_url, e))
        })?;

        let burst = match (self.scraper.burst_max, self.scraper.burst_refill_per_sec) {
            (Some(max), Some(rate)) => Some((max, rate)),
            _ => None,
        };

        Ok(ScraperSettings {
            base_url,
            allowed_hosts: HostAllowList::new(self.scraper.allowed_hosts.iter().cloned()),
            user_agents: self.scraper.user_agents.clone(),
            rate_limit: Duration::from_millis(self.scraper.rate_limit_ms),
            burst,
            request_timeout: Duration::from_secs(self.scraper.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.scraper.connect_timeout_secs),
            retry: self.retry_config(),
        })
    }

    pub fn scoring(&self) -> ScoringConfig {
        ScoringConfig {
            set_weight: self.normalizer.set_weight,
            type_weight: self.normalizer.type_weight,
            pattern_ceiling: self.normalizer.pattern_ceiling,
            generic_base: self.normalizer.generic_base,
            generic_category: self.normalizer.generic_category,
            set_bonus: self.normalizer.set_bonus,
        }
    }

    /// Built-in catalogue with the configured scoring and exclusions
    pub fn build_normalizer(&self) -> Normalizer {
        Normalizer::with_scoring(self.scoring())
            .with_exclusions(self.normalizer.extra_exclusions.iter().cloned())
    }

    pub fn analyzer_settings(&self, config_hash: Option<String>) -> AnalyzerSettings {
        AnalyzerSettings {
            confidence_floor: self.analysis.confidence_floor,
            lookback_days: self.analysis.lookback_days,
            progress_every: self.analysis.progress_every,
            default_max_pages: self.analysis.max_pages,
            config_hash,
        }
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        (self.analysis.timeout_secs > 0).then(|| Duration::from_secs(self.analysis.timeout_secs))
    }
}
