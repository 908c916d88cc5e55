//! Resale-Scout: sold-listing volume analysis for sealed trading-card products
//!
//! This crate crawls a marketplace's completed-sale search results, recognizes
//! which product each listing title refers to, and stores the recognized sales
//! so per-product volume and margin statistics can be reported.

pub mod analyzer;
pub mod config;
pub mod context;
pub mod crawler;
pub mod normalizer;
pub mod output;
pub mod state;
pub mod storage;
pub mod throttle;
pub mod url;

use thiserror::Error;

/// Main error type for Resale-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("An analysis is already running")]
    AlreadyRunning,

    #[error("Analysis interrupted: {0}")]
    Interrupted(#[from] context::ContextError),

    #[error("Scrape failed: {0}")]
    Scrape(#[from] crawler::ScrapeError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScoutError {
    /// Returns true when the failure came from cancellation or a deadline
    ///
    /// Callers use this to suggest retrying with a smaller scope instead of
    /// reporting a hard failure.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Interrupted(_) => true,
            Self::Scrape(crawler::ScrapeError::Interrupted { .. }) => true,
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingDomain,

    #[error("Host not in allow-list: {0}")]
    HostNotAllowed(String),
}

/// Result type alias for Resale-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use analyzer::{AnalysisResult, AnalyzeOptions, Analyzer};
pub use config::Config;
pub use context::{ContextError, RunContext};
pub use crawler::{RawSale, ScrapeOptions, ScrapeResult, Scraper};
pub use normalizer::{NormalizedProduct, Normalizer, ProductCategory};
pub use state::{AnalysisPhase, AnalysisProgress, AnalysisStatus};
