//! Output module for statistics and market reports
//!
//! This module handles:
//! - Aggregating stored sales into per-product statistics
//! - Estimating resale margins net of fees
//! - Printing console tables and writing markdown reports

mod markdown;
pub mod profit;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_report, generate_markdown_report};
pub use profit::{ProfitBreakdown, ProfitCalculator, ProfitabilityLevel, DEFAULT_FEE_RATE};
pub use stats::{load_product_stats, print_statistics, ProductStats, StatsQuery, StatsSort};
pub use traits::{CategoryTotals, MarketSummary, OutputError, OutputResult};

use std::collections::BTreeMap;

use chrono::Utc;

use crate::storage::{RunStore, StatsStore};

/// Builds a market summary from storage
///
/// # Arguments
///
/// * `storage` - The storage backend containing sales data
/// * `query` - Ranking, filtering and paging for the product table
///
/// # Returns
///
/// * `Ok(MarketSummary)` - Successfully generated summary
/// * `Err(OutputError)` - Failed to read from storage
pub fn generate_summary<S>(storage: &S, query: &StatsQuery) -> OutputResult<MarketSummary>
where
    S: RunStore + StatsStore + ?Sized,
{
    let generated_at = Utc::now();
    let window_start = query.effective_since(generated_at);

    // Category totals cover every product, independent of paging
    let mut category_totals: BTreeMap<_, CategoryTotals> = BTreeMap::new();
    for entry in storage.product_sales(window_start, query.category)? {
        let totals = category_totals.entry(entry.product.category).or_default();
        totals.products += 1;
        totals.sales += entry.sales.len();
        totals.volume_eur += entry.sales.iter().map(|s| s.price).sum::<f64>();
    }

    let ranked_query = StatsQuery {
        since: Some(window_start),
        ..query.clone()
    };
    let products = load_product_stats(storage, &ranked_query)?;

    Ok(MarketSummary {
        generated_at,
        window_start,
        last_run: storage.latest_run()?,
        products,
        category_totals,
    })
}
