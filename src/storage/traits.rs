//! Storage traits and error types
//!
//! The analyzer consumes the store traits here; [`SqliteStorage`] implements
//! them all.
//!
//! [`SqliteStorage`]: super::SqliteStorage

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::normalizer::ProductCategory;
use crate::storage::{ProductRecord, ProductSales, RunRecord, SaleRecord};

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Canonical products keyed by name
pub trait ProductStore {
    fn find_by_canonical_name(&self, name: &str) -> StorageResult<Option<ProductRecord>>;

    /// Inserts the product, or returns the stored one if the name exists
    ///
    /// A concurrent insert of the same name is resolved by re-reading the
    /// winner, so this never reports a duplicate.
    fn create_or_find(&mut self, product: &ProductRecord) -> StorageResult<ProductRecord>;
}

/// Sales deduplicated by listing URL
pub trait SaleStore {
    /// Inserts all sales in one transaction and returns how many were new
    fn bulk_insert(&mut self, sales: &[SaleRecord]) -> StorageResult<usize>;

    fn count_sales(&self) -> StorageResult<u64>;
}

/// Analysis run records
pub trait RunStore {
    fn create_run(&mut self, run: &RunRecord) -> StorageResult<()>;

    fn update_run(&mut self, run: &RunRecord) -> StorageResult<()>;

    fn get_run(&self, id: &str) -> StorageResult<Option<RunRecord>>;

    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// The most recent run still in the `running` state
    fn find_running(&self) -> StorageResult<Option<RunRecord>>;

    /// Fails runs left `running` for longer than the threshold
    ///
    /// Returns the number of runs updated. Used for crash recovery at startup.
    fn mark_stale_running(&mut self, older_than_minutes: i64) -> StorageResult<usize>;
}

/// Read access for statistics
pub trait StatsStore {
    /// Products with their sales since `since`, optionally for one category
    fn product_sales(
        &self,
        since: DateTime<Utc>,
        category: Option<ProductCategory>,
    ) -> StorageResult<Vec<ProductSales>>;
}

/// Everything the analyzer and reports need from a backend
pub trait Storage: ProductStore + SaleStore + RunStore + StatsStore + Send {}

impl<T> Storage for T where T: ProductStore + SaleStore + RunStore + StatsStore + Send {}
