//! Configuration module for Resale-Scout
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and turning them into the settings each component takes.
//!
//! # Example
//!
//! ```no_run
//! use resale_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scout.toml")).unwrap();
//! println!("Scraping {}", config.scraper.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AnalysisConfig, Config, NormalizerConfig, OutputConfig, RetrySection, ScraperConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
