//! Storage module for persisting analysis data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Canonical products, deduplicated by name
//! - Sales, deduplicated by listing URL
//! - Analysis run records and stale-run recovery

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_VERSION};
pub use sqlite::SqliteStorage;
pub use traits::{
    ProductStore, RunStore, SaleStore, StatsStore, Storage, StorageError, StorageResult,
};

use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::normalizer::{NormalizedProduct, ProductCategory};

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A canonical product
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub id: String,
    pub canonical_name: String,
    pub category: ProductCategory,
    pub set_name: Option<String>,
    pub set_code: Option<String>,
    pub msrp: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Builds a not-yet-persisted product from a recognition result
    pub fn from_normalized(product: &NormalizedProduct) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            canonical_name: product.canonical_name.clone(),
            category: product.category,
            set_name: product.set_name.clone(),
            set_code: product.set_code.clone(),
            msrp: product.msrp,
            created_at: Utc::now(),
        }
    }
}

/// A recognized sale attached to a product
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub product_id: String,
    pub run_id: String,
    pub platform: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub sold_at: DateTime<Utc>,
    pub url: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// A price observation used for statistics
#[derive(Debug, Clone, PartialEq)]
pub struct SalePoint {
    pub price: f64,
    pub sold_at: DateTime<Utc>,
}

/// A product with its sales inside a time window
#[derive(Debug, Clone)]
pub struct ProductSales {
    pub product: ProductRecord,
    pub sales: Vec<SalePoint>,
}

/// Represents an analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub products_count: u64,
    pub sales_count: u64,
    pub search_query: Option<String>,
    pub error_message: Option<String>,
    pub config_hash: Option<String>,
}

impl RunRecord {
    /// A fresh run in the `running` state
    pub fn start(search_query: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Running,
            products_count: 0,
            sales_count: 0,
            search_query,
            error_message: None,
            config_hash: None,
        }
    }

    pub fn complete(&mut self, products_count: u64, sales_count: u64) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.products_count = products_count;
        self.sales_count = sales_count;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message.into());
    }
}

/// Status of an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = RunRecord::start(Some("etb".into()));
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.completed_at.is_none());

        run.complete(3, 42);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.products_count, 3);
        assert_eq!(run.sales_count, 42);
        assert!(run.completed_at.is_some());

        let mut failed = RunRecord::start(None);
        failed.fail("boom");
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_product_from_normalized() {
        let normalized = NormalizedProduct {
            canonical_name: "ETB Écarlate et Violet 151".into(),
            category: ProductCategory::Etb,
            set_name: Some("Écarlate et Violet 151".into()),
            set_code: Some("sv-151".into()),
            msrp: Some(54.99),
            confidence: 0.8,
        };
        let a = ProductRecord::from_normalized(&normalized);
        let b = ProductRecord::from_normalized(&normalized);

        assert_eq!(a.canonical_name, normalized.canonical_name);
        assert_eq!(a.msrp, Some(54.99));
        assert_ne!(a.id, b.id);
    }
}
