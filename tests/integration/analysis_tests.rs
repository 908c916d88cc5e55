//! Integration tests for the analysis pipeline
//!
//! These tests run the analyzer end-to-end: a wiremock marketplace or a
//! scripted sale source feeds it, and results land in an on-disk SQLite
//! database.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use resale_scout::analyzer::{progress_channel, AnalyzerSettings, ProgressCallback, SharedStorage};
use resale_scout::crawler::{RawSale, SaleSource, ScrapeError, ScrapeResult, ScraperSettings};
use resale_scout::storage::{RunStatus, RunStore, SaleStore, SqliteStorage, StatsStore};
use resale_scout::throttle::RetryConfig;
use resale_scout::{
    AnalysisPhase, AnalysisProgress, AnalyzeOptions, Analyzer, RunContext, ScoutError, ScrapeOptions, Scraper,
};
use tempfile::TempDir;
use tokio::sync::Notify;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Opens a fresh database in a temporary directory
fn temp_storage() -> (TempDir, Arc<Mutex<SqliteStorage>>) {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::new(&dir.path().join("scout.db")).unwrap();
    (dir, Arc::new(Mutex::new(storage)))
}

fn raw_sale(id: u32, title: &str, price: f64) -> RawSale {
    RawSale {
        title: title.to_string(),
        price,
        currency: "EUR".to_string(),
        sold_at: Utc::now() - chrono::Duration::days(1),
        url: Some(format!("https://www.ebay.fr/itm/{}", id)),
        platform: "ebay".to_string(),
        metadata: BTreeMap::new(),
    }
}

/// Returns the same sales on every call
struct ScriptedSource {
    sales: Vec<RawSale>,
}

#[async_trait]
impl SaleSource for ScriptedSource {
    async fn scrape(
        &self,
        _opts: &ScrapeOptions,
        _ctx: &RunContext,
    ) -> Result<ScrapeResult, ScrapeError> {
        Ok(ScrapeResult {
            sales: self.sales.clone(),
            pages_scraped: 1,
            ..ScrapeResult::default()
        })
    }
}

/// Parks inside `scrape` until released
struct BlockingSource {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl SaleSource for BlockingSource {
    async fn scrape(
        &self,
        _opts: &ScrapeOptions,
        _ctx: &RunContext,
    ) -> Result<ScrapeResult, ScrapeError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(ScrapeResult::default())
    }
}

fn scripted_analyzer(sales: Vec<RawSale>, storage: &Arc<Mutex<SqliteStorage>>) -> Analyzer {
    let shared: SharedStorage = storage.clone();
    Analyzer::new(Arc::new(ScriptedSource { sales }), shared)
}

fn card(id: u32, title: &str, price: &str) -> String {
    format!(
        r#"<li class="s-item">
  <div class="s-item__title">{}</div>
  <span class="s-item__price">{}</span>
  <a class="s-item__link" href="/itm/{}?hash=abc">voir</a>
</li>"#,
        title, price, id
    )
}

fn page(cards: &[String]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><body><ul>{}</ul></body></html>",
            cards.join("\n")
        ))
        .insert_header("content-type", "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_end_to_end_against_mock_marketplace() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_pgn", "2"))
        .respond_with(page(&[]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(page(&[
            card(1, "Coffret Dresseur d'Élite Pokémon 151 FR scellé", "79,90 EUR"),
            card(2, "Display Pokémon 151 36 boosters", "249,00 EUR"),
            card(3, "Yugioh booster box 25th", "90,00 EUR"),
        ]))
        .mount(&server)
        .await;

    let mut settings = ScraperSettings::new(Url::parse(&server.uri()).unwrap());
    settings.rate_limit = Duration::ZERO;
    settings.retry = RetryConfig {
        max_retries: 0,
        jitter: false,
        ..RetryConfig::default()
    };
    let scraper = Scraper::new(settings).unwrap();

    let (_dir, storage) = temp_storage();
    let shared: SharedStorage = storage.clone();
    let analyzer = Analyzer::new(Arc::new(scraper), shared);

    let result = analyzer
        .run(
            AnalyzeOptions::new("pokemon 151").max_pages(5),
            &RunContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.pages_scraped, 2);
    assert_eq!(result.page_errors, 0);
    assert_eq!(result.products_count, 2);
    assert_eq!(result.sales_count, 2);

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_sales().unwrap(), 2);

    let run = storage.get_run(&result.run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.search_query.as_deref(), Some("pokemon 151"));
    assert!(run.completed_at.is_some());

    let grouped = storage
        .product_sales(Utc::now() - chrono::Duration::days(30), None)
        .unwrap();
    assert_eq!(grouped.len(), 2);
    assert!(grouped.iter().all(|p| p.product.msrp.is_some()));
}

#[tokio::test]
async fn test_concurrent_run_rejected() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = BlockingSource {
        entered: entered.clone(),
        release: release.clone(),
    };

    let (_dir, storage) = temp_storage();
    let shared: SharedStorage = storage.clone();
    let analyzer = Arc::new(Analyzer::new(Arc::new(source), shared));

    let first = {
        let analyzer = analyzer.clone();
        tokio::spawn(async move {
            analyzer
                .run(AnalyzeOptions::new("etb"), &RunContext::new())
                .await
        })
    };
    entered.notified().await;

    assert!(analyzer.is_running());
    let status = analyzer.get_status().unwrap();
    assert!(status.running);
    let first_id = status.run_id.clone().unwrap();

    let second = analyzer
        .run(AnalyzeOptions::new("display"), &RunContext::new())
        .await;
    assert!(matches!(second, Err(ScoutError::AlreadyRunning)));

    // The rejected call leaves the active run alone
    assert_eq!(analyzer.get_status().unwrap().run_id, Some(first_id.clone()));

    release.notify_one();
    let result = first.await.unwrap().unwrap();
    assert_eq!(result.run_id, first_id);
    assert!(!analyzer.is_running());

    let run = storage.lock().unwrap().latest_run().unwrap().unwrap();
    assert_eq!(run.id, first_id);
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_zero_results_completes_run() {
    let (_dir, storage) = temp_storage();
    let analyzer = scripted_analyzer(Vec::new(), &storage);

    let result = analyzer
        .run(AnalyzeOptions::new("etb 151"), &RunContext::new())
        .await
        .unwrap();

    assert_eq!(result.products_count, 0);
    assert_eq!(result.sales_count, 0);
    assert!(!analyzer.is_running());

    let run = storage.lock().unwrap().get_run(&result.run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.sales_count, 0);
}

#[tokio::test]
async fn test_low_confidence_titles_not_persisted() {
    let (_dir, storage) = temp_storage();
    let analyzer = scripted_analyzer(
        vec![
            raw_sale(1, "ETB Pokémon 151 Coffret Dresseur d'Élite", 80.0),
            raw_sale(2, "Figurine Pikachu en peluche", 25.0),
        ],
        &storage,
    )
    .with_settings(AnalyzerSettings {
        confidence_floor: 0.6,
        ..AnalyzerSettings::default()
    });

    let result = analyzer
        .run(AnalyzeOptions::new("pokemon"), &RunContext::new())
        .await
        .unwrap();

    assert_eq!(result.sales_count, 1);
    assert_eq!(storage.lock().unwrap().count_sales().unwrap(), 1);
}

#[tokio::test]
async fn test_repeat_run_does_not_duplicate_sales() {
    let (_dir, storage) = temp_storage();
    let sales = vec![
        raw_sale(10, "ETB 151 Pokémon FR", 79.0),
        raw_sale(11, "ETB 151 Pokémon FR neuf", 81.0),
    ];
    let analyzer = scripted_analyzer(sales, &storage);

    let first = analyzer
        .run(AnalyzeOptions::new("etb 151"), &RunContext::new())
        .await
        .unwrap();
    let second = analyzer
        .run(AnalyzeOptions::new("etb 151"), &RunContext::new())
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    // Counts are of records attempted; the unique URL keeps storage clean
    assert_eq!(second.sales_count, 2);
    assert_eq!(storage.lock().unwrap().count_sales().unwrap(), 2);
}

#[tokio::test]
async fn test_progress_events_end_with_complete() {
    let (_dir, storage) = temp_storage();
    let analyzer = scripted_analyzer(
        vec![
            raw_sale(1, "ETB 151 Pokémon", 79.0),
            raw_sale(2, "Display 151 Pokémon 36 boosters", 250.0),
        ],
        &storage,
    );

    let (on_progress, mut rx) = progress_channel(64);
    analyzer
        .run(
            AnalyzeOptions::new("pokemon 151").on_progress(on_progress),
            &RunContext::new(),
        )
        .await
        .unwrap();

    let mut phases = Vec::new();
    while let Some(progress) = rx.recv().await {
        phases.push(progress.phase);
    }

    assert_eq!(phases.first(), Some(&AnalysisPhase::Scraping));
    assert!(phases.contains(&AnalysisPhase::Normalizing));
    assert!(phases.contains(&AnalysisPhase::Saving));
    assert_eq!(phases.last(), Some(&AnalysisPhase::Complete));
}

#[tokio::test]
async fn test_cancelled_run_is_failed_and_releases_slot() {
    let (_dir, storage) = temp_storage();
    let analyzer = scripted_analyzer(vec![raw_sale(1, "ETB 151 Pokémon", 79.0)], &storage);

    let ctx = RunContext::new();
    ctx.cancel();
    let (on_progress, mut rx) = progress_channel(64);

    let err = analyzer
        .run(AnalyzeOptions::new("etb").on_progress(on_progress), &ctx)
        .await
        .unwrap_err();
    assert!(err.is_cancellation());
    assert!(!analyzer.is_running());

    let mut last = None;
    while let Some(progress) = rx.recv().await {
        last = Some(progress.phase);
    }
    assert_eq!(last, Some(AnalysisPhase::Failed));

    let run = storage.lock().unwrap().latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.is_some());

    // The slot is free again
    let again = analyzer
        .run(AnalyzeOptions::new("etb"), &RunContext::new())
        .await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn test_cancel_during_saving_fails_run() {
    let (_dir, storage) = temp_storage();
    let sales = (0..20)
        .map(|id| raw_sale(id, "ETB 151 Pokémon FR", 80.0))
        .collect();
    let analyzer = scripted_analyzer(sales, &storage);

    let ctx = RunContext::new();
    let canceller = ctx.clone();
    let (forward, mut rx) = progress_channel(64);
    let on_progress: ProgressCallback = Arc::new(move |progress: &AnalysisProgress| {
        forward(progress);
        if progress.phase == AnalysisPhase::Saving {
            canceller.cancel();
        }
    });

    let err = analyzer
        .run(AnalyzeOptions::new("etb 151").on_progress(on_progress), &ctx)
        .await
        .unwrap_err();
    assert!(err.is_cancellation());
    assert!(!analyzer.is_running());

    let mut phases = Vec::new();
    while let Some(progress) = rx.recv().await {
        phases.push(progress.phase);
    }
    assert!(phases.contains(&AnalysisPhase::Saving));
    assert_eq!(phases.last(), Some(&AnalysisPhase::Failed));

    let storage = storage.lock().unwrap();
    let run = storage.latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(storage.count_sales().unwrap(), 0);
}
