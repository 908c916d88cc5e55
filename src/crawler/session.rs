//! Crawl sessions over paginated completed-sale results

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::fetcher::{build_http_client, fetch_page, ClientSettings, FetchError};
use super::parser::parse_listing_page;
use super::types::{HealthStatus, PageError, RawSale, ScrapeOptions, ScrapeResult};
use crate::context::{ContextError, RunContext};
use crate::throttle::{FixedDelayLimiter, RetryConfig, RetryError, Retryer, TokenBucket};
use crate::url::{build_search_url, HostAllowList, SearchRequest, SortOrder};
use crate::UrlError;

/// Marketplace the crawler targets when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "https://www.ebay.fr";

/// Browser identities rotated across sessions
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Why a crawl session ended without a result
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Search query must not be empty")]
    InvalidQuery,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Cancelled or timed out; carries whatever was collected
    #[error("Scrape interrupted after {pages} pages: {cause}", pages = .partial.pages_scraped)]
    Interrupted {
        partial: Box<ScrapeResult>,
        cause: ContextError,
    },
}

impl ScrapeError {
    /// Takes the partial result out of an interrupted session
    pub fn into_partial(self) -> Option<ScrapeResult> {
        match self {
            Self::Interrupted { partial, .. } => Some(*partial),
            _ => None,
        }
    }
}

/// Everything a [`Scraper`] needs to know about its target
#[derive(Debug, Clone)]
pub struct ScraperSettings {
    pub base_url: Url,
    pub allowed_hosts: HostAllowList,
    pub user_agents: Vec<String>,
    /// Minimum delay between page requests
    pub rate_limit: Duration,
    /// Optional burst cap as (max tokens, refill per second)
    pub burst: Option<(u32, f64)>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl ScraperSettings {
    /// Settings for `base_url` with the default pacing and identity pool
    ///
    /// Only the base URL's own host is allowed.
    pub fn new(base_url: Url) -> Self {
        let host = base_url.host_str().unwrap_or_default().to_string();
        Self {
            base_url,
            allowed_hosts: HostAllowList::new([host]),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            rate_limit: Duration::from_secs(2),
            burst: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

/// Polite crawler for completed-sale search results
///
/// A scraper owns its pacing state, so consecutive sessions on the same
/// instance stay spaced by the rate limit.
#[derive(Debug)]
pub struct Scraper {
    settings: ScraperSettings,
    limiter: FixedDelayLimiter,
    bucket: Option<TokenBucket>,
    retryer: Retryer,
    rng: Mutex<StdRng>,
}

impl Scraper {
    /// Creates a scraper seeded from OS randomness
    pub fn new(settings: ScraperSettings) -> Result<Self, UrlError> {
        Self::with_rng(settings, StdRng::from_os_rng())
    }

    /// Creates a scraper whose identity rotation and jitter follow `rng`
    pub fn with_rng(settings: ScraperSettings, mut rng: StdRng) -> Result<Self, UrlError> {
        settings.allowed_hosts.check(&settings.base_url)?;

        let retry_rng = StdRng::from_rng(&mut rng);
        Ok(Self {
            limiter: FixedDelayLimiter::new(settings.rate_limit),
            bucket: settings
                .burst
                .map(|(max, rate)| TokenBucket::new(max, rate)),
            retryer: Retryer::with_rng(settings.retry.clone(), retry_rng),
            rng: Mutex::new(rng),
            settings,
        })
    }

    pub fn settings(&self) -> &ScraperSettings {
        &self.settings
    }

    /// Crawls result pages 1..=max_pages for one query
    ///
    /// A page that still fails after retries is recorded in
    /// [`ScrapeResult::errors`] and the session moves on. A page after the
    /// first with no sales in the window ends pagination. Cancellation or a
    /// deadline returns [`ScrapeError::Interrupted`] with the partial result.
    pub async fn scrape(
        &self,
        opts: &ScrapeOptions,
        ctx: &RunContext,
    ) -> Result<ScrapeResult, ScrapeError> {
        let query = opts.query.trim();
        if query.is_empty() {
            return Err(ScrapeError::InvalidQuery);
        }

        let client = self.session_client()?;
        let started = Instant::now();
        let mut result = ScrapeResult::default();

        info!(
            query = %query,
            category = opts.category.as_deref().unwrap_or("all"),
            max_pages = opts.effective_max_pages(),
            "Starting scrape session"
        );

        let outcome = self
            .scrape_pages(&client, query, opts, ctx, &mut result)
            .await;
        result.duration = started.elapsed();

        match outcome {
            Ok(()) => {
                info!(
                    pages = result.pages_scraped,
                    sales = result.sales.len(),
                    errors = result.errors.len(),
                    elapsed_ms = result.duration.as_millis() as u64,
                    "Scrape session finished"
                );
                Ok(result)
            }
            Err(cause) => {
                warn!(
                    pages = result.pages_scraped,
                    sales = result.sales.len(),
                    "Scrape session interrupted: {}",
                    cause
                );
                Err(ScrapeError::Interrupted {
                    partial: Box::new(result),
                    cause,
                })
            }
        }
    }

    async fn scrape_pages(
        &self,
        client: &Client,
        query: &str,
        opts: &ScrapeOptions,
        ctx: &RunContext,
        result: &mut ScrapeResult,
    ) -> Result<(), ContextError> {
        let since = opts.effective_since(Utc::now());
        let hosts = &self.settings.allowed_hosts;

        for page in 1..=opts.effective_max_pages() {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            self.limiter.wait(ctx).await?;
            if let Some(bucket) = &self.bucket {
                bucket.take_wait(ctx).await?;
            }

            let request = SearchRequest {
                query,
                category: opts.category.as_deref(),
                sort: SortOrder::EndedRecently,
                page,
            };
            let url = match build_search_url(&self.settings.base_url, &request) {
                Ok(url) => url,
                Err(e) => {
                    record_page_error(result, page, &e);
                    continue;
                }
            };

            debug!(page, url = %url, "Fetching results page");
            let fetched = ctx
                .run(self.retryer.run_if(ctx, FetchError::is_transient, || {
                    fetch_page(client, &url, hosts)
                }))
                .await?;

            let fetched = match fetched {
                Ok(fetched) => fetched,
                Err(RetryError::Cancelled(err)) => return Err(err),
                Err(e) => {
                    record_page_error(result, page, &e);
                    continue;
                }
            };

            let parsed = parse_listing_page(&fetched.body, &fetched.final_url, Utc::now());
            let found = parsed.sales.len();
            let kept: Vec<RawSale> = parsed
                .sales
                .into_iter()
                .filter(|sale| sale.sold_at >= since)
                .collect();
            let kept_count = kept.len();

            result.sales.extend(kept);
            result.pages_scraped += 1;

            info!(
                page,
                found,
                kept = kept_count,
                total = result.sales.len(),
                "Scraped results page"
            );

            if page > 1 && kept_count == 0 {
                info!(page, "No sales on page, treating as end of results");
                break;
            }
        }

        Ok(())
    }

    /// Probes the base URL once
    ///
    /// Uses a fresh client and bypasses the rate limiter and retryer, so it
    /// never changes crawl pacing.
    pub async fn health_check(&self, ctx: &RunContext) -> HealthStatus {
        let started = Instant::now();
        let mut status = HealthStatus {
            healthy: false,
            target: self
                .settings
                .base_url
                .host_str()
                .unwrap_or_default()
                .to_string(),
            status_code: None,
            response_time: Duration::ZERO,
            error: None,
            checked_at: Utc::now(),
        };

        let client = match self.session_client() {
            Ok(client) => client,
            Err(e) => {
                status.error = Some(e.to_string());
                return status;
            }
        };

        let hosts = &self.settings.allowed_hosts;
        match ctx
            .run(fetch_page(&client, &self.settings.base_url, hosts))
            .await
        {
            Ok(Ok(page)) => {
                status.status_code = Some(page.status_code);
                status.healthy = page.status_code == 200;
                if !status.healthy {
                    status.error = Some(format!("unexpected status code: {}", page.status_code));
                }
            }
            Ok(Err(e)) => {
                status.status_code = e.status_code();
                status.error = Some(e.to_string());
            }
            Err(e) => status.error = Some(e.to_string()),
        }

        status.response_time = started.elapsed();
        status
    }

    fn session_client(&self) -> Result<Client, ScrapeError> {
        let settings = ClientSettings {
            user_agent: self.pick_user_agent(),
            request_timeout: self.settings.request_timeout,
            connect_timeout: self.settings.connect_timeout,
        };
        Ok(build_http_client(&settings, &self.settings.allowed_hosts)?)
    }

    fn pick_user_agent(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.settings
            .user_agents
            .choose(&mut *rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENTS[0].to_string())
    }
}

fn record_page_error(result: &mut ScrapeResult, page: u32, err: &dyn std::fmt::Display) {
    let message = format!("failed to scrape page {}: {}", page, err);
    warn!(page, "{}", message);
    result.errors.push(PageError { page, message });
}
