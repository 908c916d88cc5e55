//! Analysis orchestration
//!
//! Drives one run through scraping, normalizing and saving, while keeping
//! the run observable through the analyzer's status slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, error, info, warn};

use super::types::{AnalysisResult, AnalyzeOptions, AnalyzerSettings, ProgressCallback};
use crate::context::RunContext;
use crate::crawler::{RawSale, SaleSource, ScrapeOptions};
use crate::normalizer::{NormalizedProduct, Normalizer};
use crate::state::{AnalysisPhase, AnalysisProgress, AnalysisStatus, StatusSlot};
use crate::storage::{
    ProductRecord, ProductStore, RunRecord, RunStore, SaleRecord, SaleStore, Storage,
    StorageError, StorageResult,
};
use crate::ScoutError;

/// Storage handle shared between the analyzer and the host process
pub type SharedStorage = Arc<Mutex<dyn Storage>>;

/// Wraps a backend so it can be handed to an [`Analyzer`]
pub fn share_storage<S: Storage + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Single-flight analysis orchestrator
///
/// Each instance owns its own status slot, so independent analyzers do not
/// block one another.
pub struct Analyzer {
    source: Arc<dyn SaleSource>,
    normalizer: Normalizer,
    storage: SharedStorage,
    status: StatusSlot,
    settings: AnalyzerSettings,
}

/// Counts produced by the normalize/save phase
struct ProcessedSales {
    products: usize,
    sales: usize,
}

impl Analyzer {
    pub fn new(source: Arc<dyn SaleSource>, storage: SharedStorage) -> Self {
        Self {
            source,
            normalizer: Normalizer::new(),
            storage,
            status: StatusSlot::new(),
            settings: AnalyzerSettings::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_settings(mut self, settings: AnalyzerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Returns true while a run holds this analyzer's status slot
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Current status, falling back to a `running` record in storage
    ///
    /// The fallback lets a fresh process see a run started elsewhere. Takes
    /// no [`RunContext`]: the read is synchronous and never waits on I/O
    /// beyond the storage lock.
    pub fn get_status(&self) -> crate::Result<AnalysisStatus> {
        if let Some(status) = self.status.snapshot() {
            return Ok(status);
        }

        let running = self.with_storage(|s| s.find_running())?;
        Ok(match running {
            Some(run) => AnalysisStatus {
                running: true,
                run_id: Some(run.id),
                started_at: Some(run.started_at),
                progress: None,
            },
            None => AnalysisStatus::idle(),
        })
    }

    /// Executes one complete analysis run
    ///
    /// Fails fast with [`ScoutError::AlreadyRunning`] if another run is
    /// active on this analyzer, leaving that run untouched.
    pub async fn run(
        &self,
        opts: AnalyzeOptions,
        ctx: &RunContext,
    ) -> crate::Result<AnalysisResult> {
        let query = opts.query.trim();
        if query.is_empty() {
            return Err(ScoutError::Validation("search query must not be empty".into()));
        }

        let mut run = RunRecord::start(Some(query.to_string()));
        run.config_hash = self.settings.config_hash.clone();

        let Some(_guard) = self.status.try_begin(&run.id, run.started_at) else {
            warn!(query = %query, "Rejected analysis: another run is in progress");
            return Err(ScoutError::AlreadyRunning);
        };

        self.with_storage(|s| s.create_run(&run))?;
        info!(run_id = %run.id, query = %query, "Analysis started");

        let callback = opts.on_progress.clone();
        match self.execute(&mut run, &opts, ctx).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.fail_run(&mut run, &e);
                self.report(
                    callback.as_ref(),
                    AnalysisProgress {
                        phase: AnalysisPhase::Failed,
                        message: format!("Analysis failed: {}", e),
                        ..AnalysisProgress::default()
                    },
                );
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut RunRecord,
        opts: &AnalyzeOptions,
        ctx: &RunContext,
    ) -> crate::Result<AnalysisResult> {
        let started = Instant::now();
        let callback = opts.on_progress.as_ref();

        // ===== Phase 1: scrape =====
        self.report(
            callback,
            AnalysisProgress::new(AnalysisPhase::Scraping, 0.1, "Starting scrape..."),
        );

        let max_pages = if opts.max_pages == 0 {
            self.settings.default_max_pages
        } else {
            opts.max_pages
        };
        let since = ChronoDuration::try_days(self.settings.lookback_days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                ScoutError::Validation(format!(
                    "lookback of {} days is out of range",
                    self.settings.lookback_days
                ))
            })?;
        let scrape_opts = ScrapeOptions {
            query: opts.query.trim().to_string(),
            category: opts.category.clone(),
            max_pages,
            since: Some(since),
        };

        let scraped = self.source.scrape(&scrape_opts, ctx).await?;
        for page_error in &scraped.errors {
            warn!(page = page_error.page, error = %page_error.message, "Page skipped");
        }

        let sales_found = scraped.sales.len();
        self.report(
            callback,
            AnalysisProgress {
                phase: AnalysisPhase::Scraping,
                pages_scraped: scraped.pages_scraped,
                sales_found,
                percent_complete: 0.3,
                message: format!(
                    "Scraped {} pages, found {} sales",
                    scraped.pages_scraped, sales_found
                ),
                ..AnalysisProgress::default()
            },
        );

        if scraped.sales.is_empty() {
            self.complete_run(run, 0, 0);
            info!(run_id = %run.id, "Analysis completed with no sales");
            self.report(
                callback,
                AnalysisProgress {
                    phase: AnalysisPhase::Complete,
                    pages_scraped: scraped.pages_scraped,
                    percent_complete: 1.0,
                    message: "Analysis complete: no sales found".into(),
                    ..AnalysisProgress::default()
                },
            );
            return Ok(AnalysisResult {
                run_id: run.id.clone(),
                products_count: 0,
                sales_count: 0,
                pages_scraped: scraped.pages_scraped,
                page_errors: scraped.errors.len(),
                duration: started.elapsed(),
            });
        }

        // ===== Phase 2: normalize and save =====
        self.report(
            callback,
            AnalysisProgress {
                phase: AnalysisPhase::Normalizing,
                pages_scraped: scraped.pages_scraped,
                sales_found,
                percent_complete: 0.4,
                message: "Normalizing product names...".into(),
                ..AnalysisProgress::default()
            },
        );

        let processed =
            self.process_sales(&run.id, &scraped.sales, scraped.pages_scraped, callback, ctx)?;

        // ===== Phase 3: complete =====
        self.complete_run(run, processed.products, processed.sales);
        let duration = started.elapsed();
        info!(
            run_id = %run.id,
            products = processed.products,
            sales = processed.sales,
            duration_ms = duration.as_millis() as u64,
            "Analysis completed"
        );

        self.report(
            callback,
            AnalysisProgress {
                phase: AnalysisPhase::Complete,
                pages_scraped: scraped.pages_scraped,
                sales_found: processed.sales,
                products_matched: processed.products,
                percent_complete: 1.0,
                message: format!(
                    "Analysis complete: {} products, {} sales",
                    processed.products, processed.sales
                ),
            },
        );

        Ok(AnalysisResult {
            run_id: run.id.clone(),
            products_count: processed.products,
            sales_count: processed.sales,
            pages_scraped: scraped.pages_scraped,
            page_errors: scraped.errors.len(),
            duration,
        })
    }

    /// Normalizes raw sales and persists the recognized ones
    ///
    /// Cancellation is checked before every record, and a `Saving` event
    /// goes out every `progress_every` records whether or not the record is
    /// kept. Sales are written in a single batch once the loop completes.
    fn process_sales(
        &self,
        run_id: &str,
        raw_sales: &[RawSale],
        pages_scraped: u32,
        callback: Option<&ProgressCallback>,
        ctx: &RunContext,
    ) -> crate::Result<ProcessedSales> {
        let total = raw_sales.len();
        let every = self.settings.progress_every.max(1);
        let scraped_at = Utc::now();

        let mut products: HashMap<String, ProductRecord> = HashMap::new();
        let mut records: Vec<SaleRecord> = Vec::new();

        for (i, raw) in raw_sales.iter().enumerate() {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }

            if i % every == 0 {
                self.report(
                    callback,
                    AnalysisProgress {
                        phase: AnalysisPhase::Saving,
                        pages_scraped,
                        sales_found: total,
                        products_matched: products.len(),
                        percent_complete: 0.4 + (i as f64 / total as f64) * 0.5,
                        message: format!("Processing sale {}/{}", i + 1, total),
                    },
                );
            }

            let (normalized, confidence) = self.normalizer.normalize(&raw.title);
            if confidence < self.settings.confidence_floor {
                debug!(title = %raw.title, confidence, "Low confidence match skipped");
                continue;
            }

            if !products.contains_key(&normalized.canonical_name) {
                match self.resolve_product(&normalized) {
                    Ok(product) => {
                        products.insert(normalized.canonical_name.clone(), product);
                    }
                    Err(e) => {
                        warn!(name = %normalized.canonical_name, error = %e, "Failed to create product");
                        continue;
                    }
                }
            }
            let Some(product) = products.get(&normalized.canonical_name) else {
                continue;
            };

            records.push(SaleRecord {
                product_id: product.id.clone(),
                run_id: run_id.to_string(),
                platform: raw.platform.clone(),
                title: raw.title.clone(),
                price: raw.price,
                currency: raw.currency.clone(),
                sold_at: raw.sold_at,
                url: raw.url.clone(),
                scraped_at,
            });
        }

        if !records.is_empty() {
            let inserted = self.with_storage(|s| s.bulk_insert(&records))?;
            debug!(inserted, attempted = records.len(), "Sales inserted");
        }

        Ok(ProcessedSales {
            products: products.len(),
            sales: records.len(),
        })
    }

    fn resolve_product(&self, normalized: &NormalizedProduct) -> StorageResult<ProductRecord> {
        self.with_storage(|s| {
            if let Some(existing) = s.find_by_canonical_name(&normalized.canonical_name)? {
                return Ok(existing);
            }
            s.create_or_find(&ProductRecord::from_normalized(normalized))
        })
    }

    fn complete_run(&self, run: &mut RunRecord, products: usize, sales: usize) {
        run.complete(products as u64, sales as u64);
        if let Err(e) = self.with_storage(|s| s.update_run(run)) {
            error!(run_id = %run.id, error = %e, "Failed to update analysis run");
        }
    }

    fn fail_run(&self, run: &mut RunRecord, err: &ScoutError) {
        run.fail(err.to_string());
        if let Err(e) = self.with_storage(|s| s.update_run(run)) {
            error!(run_id = %run.id, error = %e, "Failed to update failed analysis run");
        }
        error!(run_id = %run.id, error = %err, "Analysis failed");
    }

    fn report(&self, callback: Option<&ProgressCallback>, progress: AnalysisProgress) {
        self.status.update(progress.clone());
        if let Some(callback) = callback {
            callback(&progress);
        }
    }

    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut dyn Storage) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut storage = self.storage.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&mut *storage)
    }
}
