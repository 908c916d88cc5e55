//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the store traits.

use crate::normalizer::ProductCategory;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    ProductStore, RunStore, SaleStore, StatsStore, StorageError, StorageResult,
};
use crate::storage::{ProductRecord, ProductSales, RunRecord, RunStatus, SalePoint, SaleRecord};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const PRODUCT_COLUMNS: &str =
    "id, canonical_name, category, set_name, set_code, msrp, created_at";

const RUN_COLUMNS: &str = "id, started_at, completed_at, status, products_count, sales_count,
     search_query, error_message, config_hash";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn insert_product(&self, product: &ProductRecord) -> rusqlite::Result<usize> {
        self.conn.execute(
            "INSERT INTO products (id, canonical_name, category, set_name, set_code, msrp, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                product.id,
                product.canonical_name,
                product.category.to_db_string(),
                product.set_name,
                product.set_code,
                product.msrp,
                to_db_time(&product.created_at),
            ],
        )
    }
}

impl ProductStore for SqliteStorage {
    fn find_by_canonical_name(&self, name: &str) -> StorageResult<Option<ProductRecord>> {
        let sql = format!(
            "SELECT {} FROM products WHERE canonical_name = ?1",
            PRODUCT_COLUMNS
        );
        let product = self
            .conn
            .query_row(&sql, params![name], |row| product_from_row(row, 0))
            .optional()?;
        Ok(product)
    }

    fn create_or_find(&mut self, product: &ProductRecord) -> StorageResult<ProductRecord> {
        if let Some(existing) = self.find_by_canonical_name(&product.canonical_name)? {
            return Ok(existing);
        }

        match self.insert_product(product) {
            Ok(_) => Ok(product.clone()),
            // Lost a race against another writer; the stored row wins
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                self.find_by_canonical_name(&product.canonical_name)?
                    .ok_or_else(|| {
                        StorageError::ConstraintViolation(product.canonical_name.clone())
                    })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl SaleStore for SqliteStorage {
    fn bulk_insert(&mut self, sales: &[SaleRecord]) -> StorageResult<usize> {
        if sales.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sales (product_id, run_id, platform, title, price, currency,
                 sold_at, url, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(url) DO NOTHING",
            )?;

            for sale in sales {
                inserted += stmt.execute(params![
                    sale.product_id,
                    sale.run_id,
                    sale.platform,
                    sale.title,
                    sale.price,
                    sale.currency,
                    to_db_time(&sale.sold_at),
                    sale.url,
                    to_db_time(&sale.scraped_at),
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn count_sales(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sales", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl RunStore for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, run: &RunRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO analysis_runs (id, started_at, completed_at, status, products_count,
             sales_count, search_query, error_message, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run.id,
                to_db_time(&run.started_at),
                run.completed_at.as_ref().map(to_db_time),
                run.status.to_db_string(),
                run.products_count as i64,
                run.sales_count as i64,
                run.search_query,
                run.error_message,
                run.config_hash,
            ],
        )?;
        Ok(())
    }

    fn update_run(&mut self, run: &RunRecord) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE analysis_runs SET completed_at = ?1, status = ?2, products_count = ?3,
             sales_count = ?4, error_message = ?5 WHERE id = ?6",
            params![
                run.completed_at.as_ref().map(to_db_time),
                run.status.to_db_string(),
                run.products_count as i64,
                run.sales_count as i64,
                run.error_message,
                run.id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!("run {}", run.id)));
        }
        Ok(())
    }

    fn get_run(&self, id: &str) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM analysis_runs WHERE id = ?1", RUN_COLUMNS);
        let run = self
            .conn
            .query_row(&sql, params![id], run_from_row)
            .optional()?;
        Ok(run)
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM analysis_runs ORDER BY started_at DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn find_running(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM analysis_runs WHERE status = ?1 ORDER BY started_at DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self
            .conn
            .query_row(
                &sql,
                params![RunStatus::Running.to_db_string()],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn mark_stale_running(&mut self, older_than_minutes: i64) -> StorageResult<usize> {
        let now = Utc::now();
        let cutoff = Duration::try_minutes(older_than_minutes)
            .and_then(|age| now.checked_sub_signed(age))
            .ok_or_else(|| {
                StorageError::OutOfRange(format!(
                    "stale threshold of {} minutes",
                    older_than_minutes
                ))
            })?;
        let updated = self.conn.execute(
            "UPDATE analysis_runs SET status = ?1, completed_at = ?2, error_message = ?3
             WHERE status = ?4 AND started_at < ?5",
            params![
                RunStatus::Failed.to_db_string(),
                to_db_time(&now),
                "Run marked as stale (interrupted or crashed)",
                RunStatus::Running.to_db_string(),
                to_db_time(&cutoff),
            ],
        )?;
        Ok(updated)
    }
}

impl StatsStore for SqliteStorage {
    fn product_sales(
        &self,
        since: DateTime<Utc>,
        category: Option<ProductCategory>,
    ) -> StorageResult<Vec<ProductSales>> {
        let sql = "
            SELECT p.id, p.canonical_name, p.category, p.set_name, p.set_code, p.msrp,
                   p.created_at, s.price, s.sold_at
            FROM products p
            JOIN sales s ON s.product_id = p.id
            WHERE s.sold_at >= ?1 AND (?2 IS NULL OR p.category = ?2)
            ORDER BY p.canonical_name, s.sold_at
        ";

        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(
            params![to_db_time(&since), category.map(|c| c.to_db_string())],
            |row| {
                let product = product_from_row(row, 0)?;
                let point = SalePoint {
                    price: row.get(7)?,
                    sold_at: time_column(row, 8)?,
                };
                Ok((product, point))
            },
        )?;

        // Rows arrive grouped by product because of the ORDER BY
        let mut grouped: Vec<ProductSales> = Vec::new();
        for row in rows {
            let (product, point) = row?;
            match grouped.last_mut() {
                Some(last) if last.product.id == product.id => last.sales.push(point),
                _ => grouped.push(ProductSales {
                    product,
                    sales: vec![point],
                }),
            }
        }

        Ok(grouped)
    }
}

/// Formats a timestamp so that lexical order matches time order
fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => time_column(row, idx).map(Some),
        None => Ok(None),
    }
}

fn product_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ProductRecord> {
    let category: String = row.get(offset + 2)?;
    let category = ProductCategory::from_db_string(&category).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            offset + 2,
            Type::Text,
            format!("unknown category '{}'", category).into(),
        )
    })?;

    Ok(ProductRecord {
        id: row.get(offset)?,
        canonical_name: row.get(offset + 1)?,
        category,
        set_name: row.get(offset + 3)?,
        set_code: row.get(offset + 4)?,
        msrp: row.get(offset + 5)?,
        created_at: time_column(row, offset + 6)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(3)?;
    let status = RunStatus::from_db_string(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown run status '{}'", status).into(),
        )
    })?;

    Ok(RunRecord {
        id: row.get(0)?,
        started_at: time_column(row, 1)?,
        completed_at: optional_time_column(row, 2)?,
        status,
        products_count: row.get::<_, i64>(4)? as u64,
        sales_count: row.get::<_, i64>(5)? as u64,
        search_query: row.get(6)?,
        error_message: row.get(7)?,
        config_hash: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RunStatus;

    fn product(name: &str, category: ProductCategory) -> ProductRecord {
        ProductRecord {
            id: uuid::Uuid::new_v4().to_string(),
            canonical_name: name.to_string(),
            category,
            set_name: None,
            set_code: None,
            msrp: Some(50.0),
            created_at: Utc::now(),
        }
    }

    fn sale(product_id: &str, run_id: &str, price: f64, url: Option<&str>) -> SaleRecord {
        SaleRecord {
            product_id: product_id.to_string(),
            run_id: run_id.to_string(),
            platform: "ebay".to_string(),
            title: "test listing".to_string(),
            price,
            currency: "EUR".to_string(),
            sold_at: Utc::now() - Duration::days(1),
            url: url.map(str::to_string),
            scraped_at: Utc::now(),
        }
    }

    fn storage_with_run() -> (SqliteStorage, RunRecord) {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let run = RunRecord::start(Some("etb".into()));
        storage.create_run(&run).unwrap();
        (storage, run)
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::open_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_open_on_disk_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scout.db");
        let storage = SqliteStorage::new(&path);
        assert!(storage.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_create_or_find_is_idempotent() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();

        let first = storage
            .create_or_find(&product("Display Flammes Obsidiennes", ProductCategory::Display))
            .unwrap();
        let second = storage
            .create_or_find(&product("Display Flammes Obsidiennes", ProductCategory::Display))
            .unwrap();

        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_create_or_find_recovers_from_unique_violation() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let winner = product("ETB 151", ProductCategory::Etb);
        storage.insert_product(&winner).unwrap();

        // Simulate the losing side of a race by inserting directly
        let loser = product("ETB 151", ProductCategory::Etb);
        let err = storage.insert_product(&loser).unwrap_err();
        assert!(matches!(err, rusqlite::Error::SqliteFailure(..)));

        let found = storage.create_or_find(&loser).unwrap();
        assert_eq!(found.id, winner.id);
    }

    #[test]
    fn test_find_by_canonical_name_missing() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.find_by_canonical_name("nope").unwrap().is_none());
    }

    #[test]
    fn test_bulk_insert_dedupes_by_url() {
        let (mut storage, run) = storage_with_run();
        let p = storage
            .create_or_find(&product("ETB 151", ProductCategory::Etb))
            .unwrap();

        let batch = vec![
            sale(&p.id, &run.id, 60.0, Some("https://www.ebay.fr/itm/1")),
            sale(&p.id, &run.id, 61.0, Some("https://www.ebay.fr/itm/2")),
        ];
        assert_eq!(storage.bulk_insert(&batch).unwrap(), 2);

        let again = vec![
            sale(&p.id, &run.id, 60.0, Some("https://www.ebay.fr/itm/1")),
            sale(&p.id, &run.id, 62.0, Some("https://www.ebay.fr/itm/3")),
        ];
        assert_eq!(storage.bulk_insert(&again).unwrap(), 1);
        assert_eq!(storage.count_sales().unwrap(), 3);
    }

    #[test]
    fn test_bulk_insert_keeps_sales_without_url() {
        let (mut storage, run) = storage_with_run();
        let p = storage
            .create_or_find(&product("Tin Pikachu", ProductCategory::Tin))
            .unwrap();

        let batch = vec![
            sale(&p.id, &run.id, 20.0, None),
            sale(&p.id, &run.id, 20.0, None),
        ];
        assert_eq!(storage.bulk_insert(&batch).unwrap(), 2);
    }

    #[test]
    fn test_bulk_insert_empty() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert_eq!(storage.bulk_insert(&[]).unwrap(), 0);
    }

    #[test]
    fn test_run_roundtrip() {
        let (mut storage, mut run) = storage_with_run();

        let loaded = storage.get_run(&run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Running);
        assert_eq!(loaded.search_query.as_deref(), Some("etb"));

        run.complete(2, 10);
        storage.update_run(&run).unwrap();

        let loaded = storage.get_run(&run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(loaded.products_count, 2);
        assert_eq!(loaded.sales_count, 10);
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn test_update_missing_run() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let run = RunRecord::start(None);
        let err = storage.update_run(&run).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_find_running() {
        let (mut storage, mut run) = storage_with_run();
        assert_eq!(storage.find_running().unwrap().unwrap().id, run.id);

        run.fail("boom");
        storage.update_run(&run).unwrap();
        assert!(storage.find_running().unwrap().is_none());
        assert_eq!(storage.latest_run().unwrap().unwrap().id, run.id);
    }

    #[test]
    fn test_mark_stale_running() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();

        let mut old = RunRecord::start(None);
        old.started_at = Utc::now() - Duration::minutes(90);
        storage.create_run(&old).unwrap();

        let fresh = RunRecord::start(None);
        storage.create_run(&fresh).unwrap();

        assert_eq!(storage.mark_stale_running(30).unwrap(), 1);

        let old = storage.get_run(&old.id).unwrap().unwrap();
        assert_eq!(old.status, RunStatus::Failed);
        assert!(old.error_message.is_some());

        let fresh = storage.get_run(&fresh.id).unwrap().unwrap();
        assert_eq!(fresh.status, RunStatus::Running);
    }

    #[test]
    fn test_mark_stale_running_rejects_overflowing_threshold() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_run(&RunRecord::start(None)).unwrap();

        let err = storage.mark_stale_running(i64::MAX).unwrap_err();
        assert!(matches!(err, StorageError::OutOfRange(_)));
        assert!(storage.find_running().unwrap().is_some());
    }

    #[test]
    fn test_product_sales_groups_and_filters() {
        let (mut storage, run) = storage_with_run();
        let etb = storage
            .create_or_find(&product("ETB 151", ProductCategory::Etb))
            .unwrap();
        let display = storage
            .create_or_find(&product("Display 151", ProductCategory::Display))
            .unwrap();

        let mut old_sale = sale(&etb.id, &run.id, 10.0, Some("https://www.ebay.fr/itm/old"));
        old_sale.sold_at = Utc::now() - Duration::days(90);

        storage
            .bulk_insert(&[
                sale(&etb.id, &run.id, 60.0, Some("https://www.ebay.fr/itm/1")),
                sale(&etb.id, &run.id, 70.0, Some("https://www.ebay.fr/itm/2")),
                sale(&display.id, &run.id, 200.0, Some("https://www.ebay.fr/itm/3")),
                old_sale,
            ])
            .unwrap();

        let since = Utc::now() - Duration::days(30);
        let all = storage.product_sales(since, None).unwrap();
        assert_eq!(all.len(), 2);
        let etb_sales = all
            .iter()
            .find(|p| p.product.id == etb.id)
            .map(|p| p.sales.len());
        assert_eq!(etb_sales, Some(2));

        let displays = storage
            .product_sales(since, Some(ProductCategory::Display))
            .unwrap();
        assert_eq!(displays.len(), 1);
        assert_eq!(displays[0].product.canonical_name, "Display 151");
    }
}
