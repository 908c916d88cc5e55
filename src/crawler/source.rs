use async_trait::async_trait;

use super::session::{ScrapeError, Scraper};
use super::types::{ScrapeOptions, ScrapeResult};
use crate::context::RunContext;

/// Anything that can produce a batch of raw sales for a query
///
/// The analyzer depends on this trait rather than on [`Scraper`] directly.
#[async_trait]
pub trait SaleSource: Send + Sync {
    async fn scrape(
        &self,
        opts: &ScrapeOptions,
        ctx: &RunContext,
    ) -> Result<ScrapeResult, ScrapeError>;
}

#[async_trait]
impl SaleSource for Scraper {
    async fn scrape(
        &self,
        opts: &ScrapeOptions,
        ctx: &RunContext,
    ) -> Result<ScrapeResult, ScrapeError> {
        Scraper::scrape(self, opts, ctx).await
    }
}
