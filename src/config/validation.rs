use crate::config::types::{
    AnalysisConfig, Config, NormalizerConfig, OutputConfig, RetrySection, ScraperConfig,
};
use crate::url::HostAllowList;
use crate::ConfigError;
use url::Url;

/// Upper bound on pages per run
const MAX_PAGES_LIMIT: u32 = 100;

/// Upper bound on the sold-date lookback window (ten years)
const MAX_LOOKBACK_DAYS: i64 = 3650;

/// Upper bound on the stale-run threshold (one year)
const MAX_STALE_RUN_MINUTES: i64 = 525_600;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_retry_config(&config.retry)?;
    validate_normalizer_config(&config.normalizer)?;
    validate_analysis_config(&config.analysis)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates target site, identities and pacing
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.allowed_hosts.is_empty() {
        return Err(ConfigError::Validation(
            "allowed-hosts cannot be empty".to_string(),
        ));
    }
    for pattern in &config.allowed_hosts {
        validate_host_pattern(pattern)?;
    }

    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.scheme() != "https" && base.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    let host = base
        .host_str()
        .ok_or_else(|| ConfigError::InvalidUrl(format!("base-url '{}' has no host", config.base_url)))?;
    if !HostAllowList::new(config.allowed_hosts.iter().cloned()).allows(host) {
        return Err(ConfigError::Validation(format!(
            "base-url host '{}' is not in allowed-hosts",
            host
        )));
    }

    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user-agents must contain at least one entry".to_string(),
        ));
    }
    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agents cannot contain empty entries".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request and connect timeouts must be >= 1 second".to_string(),
        ));
    }

    match (config.burst_max, config.burst_refill_per_sec) {
        (None, None) => {}
        (Some(max), Some(rate)) => {
            if max == 0 || !(rate > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "burst-max and burst-refill-per-sec must be positive, got {} and {}",
                    max, rate
                )));
            }
        }
        _ => {
            return Err(ConfigError::Validation(
                "burst-max and burst-refill-per-sec must be set together".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates the retry policy
fn validate_retry_config(config: &RetrySection) -> Result<(), ConfigError> {
    if !(config.backoff_factor >= 1.0) {
        return Err(ConfigError::Validation(format!(
            "backoff-factor must be >= 1.0, got {}",
            config.backoff_factor
        )));
    }

    if config.initial_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "initial-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.initial_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Validates scoring weights and exclusions
fn validate_normalizer_config(config: &NormalizerConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("set-weight", config.set_weight),
        ("type-weight", config.type_weight),
        ("pattern-ceiling", config.pattern_ceiling),
        ("generic-base", config.generic_base),
        ("generic-category", config.generic_category),
        ("set-bonus", config.set_bonus),
    ] {
        validate_unit_interval(name, value)?;
    }

    if config.extra_exclusions.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "extra-exclusions cannot contain empty keywords".to_string(),
        ));
    }

    Ok(())
}

/// Validates run-level limits
fn validate_analysis_config(config: &AnalysisConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 || config.max_pages > MAX_PAGES_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max-pages must be between 1 and {}, got {}",
            MAX_PAGES_LIMIT, config.max_pages
        )));
    }

    if config.lookback_days < 1 || config.lookback_days > MAX_LOOKBACK_DAYS {
        return Err(ConfigError::Validation(format!(
            "lookback-days must be between 1 and {}, got {}",
            MAX_LOOKBACK_DAYS, config.lookback_days
        )));
    }

    validate_unit_interval("confidence-floor", config.confidence_floor)?;

    if config.progress_every < 1 {
        return Err(ConfigError::Validation(
            "progress-every must be >= 1".to_string(),
        ));
    }

    if config.stale_run_minutes < 1 || config.stale_run_minutes > MAX_STALE_RUN_MINUTES {
        return Err(ConfigError::Validation(format!(
            "stale-run-minutes must be between 1 and {}, got {}",
            MAX_STALE_RUN_MINUTES, config.stale_run_minutes
        )));
    }

    if let Some(query) = &config.default_query {
        if query.trim().is_empty() {
            return Err(ConfigError::Validation(
                "default-query cannot be blank".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.report_path.is_empty() {
        return Err(ConfigError::Validation(
            "report-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be between 0.0 and 1.0, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validates a host pattern (supports wildcards)
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_host_string(domain)?;
        // Wildcards need a registrable base
        if !domain.contains('.') {
            return Err(ConfigError::InvalidPattern(format!(
                "Wildcard pattern '{}' must cover a dotted domain",
                pattern
            )));
        }
    } else {
        validate_host_string(pattern)?;
    }

    Ok(())
}

/// Validates a host string (without wildcard prefix)
fn validate_host_string(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}
