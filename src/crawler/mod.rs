//! Crawler module for fetching and parsing completed-sale listings
//!
//! This module contains:
//! - `fetcher`: HTTP client construction and fetch classification
//! - `parser`: listing extraction from results pages
//! - `session`: the paginated crawl loop and health probe
//! - `source`: the trait the analyzer consumes

mod fetcher;
mod parser;
mod session;
mod source;
mod types;

pub use fetcher::{build_http_client, fetch_page, ClientSettings, FetchError, FetchedPage};
pub use parser::{
    parse_listing_page, parse_price, parse_result_count, parse_sold_date, ParsedPage, CURRENCY,
    PLATFORM,
};
pub use session::{
    ScrapeError, Scraper, ScraperSettings, DEFAULT_BASE_URL, DEFAULT_USER_AGENTS,
};
pub use source::SaleSource;
pub use types::{
    HealthStatus, PageError, RawSale, ScrapeOptions, ScrapeResult, DEFAULT_LOOKBACK_DAYS,
    DEFAULT_MAX_PAGES,
};
