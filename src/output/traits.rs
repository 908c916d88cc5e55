//! Output error and summary types
//!
//! This module defines the error type for reporting and the data structures
//! a market report is rendered from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::normalizer::ProductCategory;
use crate::output::stats::ProductStats;
use crate::storage::{RunRecord, StorageError};

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Sales totals for one category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTotals {
    pub products: usize,
    pub sales: usize,
    /// Sum of sale prices, in euros
    pub volume_eur: f64,
}

/// Everything a market report shows
#[derive(Debug, Clone)]
pub struct MarketSummary {
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    /// Most recent run, if any
    pub last_run: Option<RunRecord>,
    /// Ranked products, already sorted and paged
    pub products: Vec<ProductStats>,
    /// Totals over every product in the window, not just the ranked ones
    pub category_totals: BTreeMap<ProductCategory, CategoryTotals>,
}

impl MarketSummary {
    pub fn total_sales(&self) -> usize {
        self.category_totals.values().map(|t| t.sales).sum()
    }

    pub fn total_products(&self) -> usize {
        self.category_totals.values().map(|t| t.products).sum()
    }

    pub fn total_volume_eur(&self) -> f64 {
        self.category_totals.values().map(|t| t.volume_eur).sum()
    }

    /// Share of ranked products selling above MSRP, in percent
    pub fn profitable_rate(&self) -> f64 {
        let with_margin = self
            .products
            .iter()
            .filter(|p| p.margin_percent.is_some())
            .count();
        if with_margin == 0 {
            return 0.0;
        }
        let profitable = self.products.iter().filter(|p| p.is_profitable()).count();
        (profitable as f64 / with_margin as f64) * 100.0
    }
}
