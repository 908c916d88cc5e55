//! Per-product statistics from the sales database
//!
//! This module aggregates stored sales into volume and price statistics and
//! prints them as a console table.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use crate::crawler::DEFAULT_LOOKBACK_DAYS;
use crate::normalizer::ProductCategory;
use crate::output::profit::{format_margin_percent, ProfitabilityLevel};
use crate::output::traits::OutputResult;
use crate::storage::{ProductSales, StatsStore};

/// Sort keys accepted by [`StatsQuery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsSort {
    #[default]
    SalesCount,
    MarginPercent,
    AvgPrice,
}

impl StatsSort {
    /// Parses a sort key, returning None for anything outside the allow-list
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sales_count" | "sales" | "volume" => Some(Self::SalesCount),
            "margin_percent" | "margin" => Some(Self::MarginPercent),
            "avg_price" | "price" => Some(Self::AvgPrice),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalesCount => "sales_count",
            Self::MarginPercent => "margin_percent",
            Self::AvgPrice => "avg_price",
        }
    }
}

/// Filters, ordering and paging for a statistics read
#[derive(Debug, Clone, PartialEq)]
pub struct StatsQuery {
    pub sort: StatsSort,
    pub descending: bool,
    pub category: Option<ProductCategory>,
    /// Products with fewer sales in the window are left out
    pub min_sales: usize,
    /// Window start; None means the default lookback before now
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Default for StatsQuery {
    fn default() -> Self {
        Self {
            sort: StatsSort::SalesCount,
            descending: true,
            category: None,
            min_sales: 1,
            since: None,
            limit: Some(10),
            offset: 0,
        }
    }
}

impl StatsQuery {
    pub fn effective_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.since
            .unwrap_or_else(|| now - Duration::days(DEFAULT_LOOKBACK_DAYS))
    }
}

/// Volume and price statistics for one product
#[derive(Debug, Clone, PartialEq)]
pub struct ProductStats {
    pub product_id: String,
    pub canonical_name: String,
    pub category: ProductCategory,
    pub set_name: Option<String>,
    pub msrp: Option<f64>,
    pub sales_count: usize,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    /// Sample standard deviation; None with fewer than two sales
    pub price_stddev: Option<f64>,
    pub last_sale_at: Option<DateTime<Utc>>,
    /// Average price minus MSRP
    pub margin_eur: Option<f64>,
    pub margin_percent: Option<f64>,
}

impl ProductStats {
    /// Aggregates one product's sales
    pub fn from_sales(entry: &ProductSales) -> Self {
        let prices: Vec<f64> = entry.sales.iter().map(|s| s.price).collect();
        let count = prices.len();

        let (avg, min, max) = if count == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = prices.iter().sum();
            let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (sum / count as f64, min, max)
        };

        let price_stddev = (count >= 2).then(|| {
            let variance =
                prices.iter().map(|p| (p - avg).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        });

        let msrp = entry.product.msrp;
        let margin_eur = msrp.map(|m| avg - m);
        let margin_percent = msrp.filter(|m| *m > 0.0).map(|m| (avg - m) / m * 100.0);

        Self {
            product_id: entry.product.id.clone(),
            canonical_name: entry.product.canonical_name.clone(),
            category: entry.product.category,
            set_name: entry.product.set_name.clone(),
            msrp,
            sales_count: count,
            avg_price: avg,
            min_price: min,
            max_price: max,
            price_stddev,
            last_sale_at: entry.sales.iter().map(|s| s.sold_at).max(),
            margin_eur,
            margin_percent,
        }
    }

    pub fn has_msrp(&self) -> bool {
        self.msrp.is_some_and(|m| m > 0.0)
    }

    pub fn is_profitable(&self) -> bool {
        self.margin_percent.is_some_and(|m| m > 0.0)
    }

    pub fn price_range(&self) -> f64 {
        self.max_price - self.min_price
    }

    pub fn profitability(&self) -> ProfitabilityLevel {
        ProfitabilityLevel::from_margin(self.margin_percent)
    }
}

/// Loads, filters, sorts and pages product statistics
pub fn load_product_stats<S: StatsStore + ?Sized>(
    storage: &S,
    query: &StatsQuery,
) -> OutputResult<Vec<ProductStats>> {
    let since = query.effective_since(Utc::now());
    let entries = storage.product_sales(since, query.category)?;

    let mut stats: Vec<ProductStats> = entries
        .iter()
        .map(ProductStats::from_sales)
        .filter(|s| s.sales_count >= query.min_sales)
        .collect();

    sort_stats(&mut stats, query.sort, query.descending);

    let paged = stats
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    Ok(paged)
}

/// Sorts in place; products without a margin always go last
pub fn sort_stats(stats: &mut [ProductStats], sort: StatsSort, descending: bool) {
    stats.sort_by(|a, b| {
        let primary = match sort {
            StatsSort::SalesCount => directed(a.sales_count.cmp(&b.sales_count), descending),
            StatsSort::AvgPrice => directed(a.avg_price.total_cmp(&b.avg_price), descending),
            StatsSort::MarginPercent => match (a.margin_percent, b.margin_percent) {
                (Some(x), Some(y)) => directed(x.total_cmp(&y), descending),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        primary.then_with(|| a.canonical_name.cmp(&b.canonical_name))
    });
}

fn directed(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[ProductStats]) {
    println!("=== Product Statistics ===\n");

    if stats.is_empty() {
        println!("No products with sales in the selected window.");
        return;
    }

    println!(
        "{:<4} {:<45} {:<10} {:>6} {:>10} {:>10} {:>10} {:>9}",
        "#", "Product", "Category", "Sales", "Avg", "Min", "Max", "Margin"
    );
    println!("{}", "-".repeat(110));

    for (i, stat) in stats.iter().enumerate() {
        println!(
            "{:<4} {:<45} {:<10} {:>6} {:>9.2}€ {:>9.2}€ {:>9.2}€ {:>9}",
            i + 1,
            truncate(&stat.canonical_name, 45),
            stat.category.to_db_string(),
            stat.sales_count,
            stat.avg_price,
            stat.min_price,
            stat.max_price,
            format_margin_percent(stat.margin_percent),
        );
    }
    println!();

    let total_sales: usize = stats.iter().map(|s| s.sales_count).sum();
    let profitable = stats.iter().filter(|s| s.is_profitable()).count();
    println!(
        "Total: {} products, {} sales, {} above MSRP",
        stats.len(),
        total_sales,
        profitable
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
