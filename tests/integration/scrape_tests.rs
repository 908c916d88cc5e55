//! Integration tests for the scraper
//!
//! These tests use wiremock to serve fixture results pages and drive full
//! scrape sessions end-to-end.

use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use resale_scout::crawler::{ScrapeError, ScraperSettings};
use resale_scout::throttle::RetryConfig;
use resale_scout::{RunContext, ScrapeOptions, Scraper};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MONTHS: [&str; 12] = [
    "janv", "févr", "mars", "avr", "mai", "juin", "juil", "août", "sept", "oct", "nov", "déc",
];

/// "Vendu le 3 oct. 2024" for a date `days_ago` days back
fn sold_label(days_ago: i64) -> String {
    let date: NaiveDate = (Utc::now() - chrono::Duration::days(days_ago)).date_naive();
    format!(
        "Vendu le {} {}. {}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

/// One `.s-item` card
fn card(id: u32, title: &str, price: &str, days_ago: i64) -> String {
    format!(
        r#"<li class="s-item">
  <div class="s-item__title"><span>{title}</span></div>
  <span class="s-item__title--tag"><span class="POSITIVE">{sold}</span></span>
  <span class="s-item__price">{price}</span>
  <span class="SECONDARY_INFO">Neuf</span>
  <span class="s-item__shipping">+5,00 EUR de frais de livraison</span>
  <a class="s-item__link" href="https://www.ebay.fr/itm/{id}?hash=item{id}&amp;_trkparms=x">lien</a>
</li>"#,
        title = title,
        sold = sold_label(days_ago),
        price = price,
        id = id,
    )
}

fn results_page(cards: &[String]) -> String {
    format!(
        r#"<html><head><title>Résultats</title></head><body>
<h1 class="srp-controls__count-heading">{} résultats</h1>
<ul class="srp-results">
<li class="s-item"><div class="s-item__title">Shop on eBay</div><span class="s-item__price">20,00 EUR</span></li>
{}
</ul></body></html>"#,
        cards.len(),
        cards.join("\n")
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Settings pointed at the mock server with no pacing
fn test_settings(server: &MockServer) -> ScraperSettings {
    let mut settings = ScraperSettings::new(Url::parse(&server.uri()).unwrap());
    settings.rate_limit = Duration::ZERO;
    settings.request_timeout = Duration::from_secs(5);
    settings.connect_timeout = Duration::from_secs(2);
    settings.retry = RetryConfig {
        max_retries: 1,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        backoff_factor: 2.0,
        jitter: false,
    };
    settings
}

/// Mounts page-specific mocks first so they win over the page 1 fallback
async fn mount_page(server: &MockServer, page: u32, response: ResponseTemplate) {
    let mock = Mock::given(method("GET")).and(path("/sch/i.html"));
    if page > 1 {
        mock.and(query_param("_pgn", page.to_string()))
            .respond_with(response)
            .mount(server)
            .await;
    } else {
        mock.respond_with(response).mount(server).await;
    }
}

#[tokio::test]
async fn test_scrape_until_empty_page() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        2,
        html(results_page(&[
            card(3, "Display 151 Pokémon scellée", "249,99 EUR", 2),
            card(4, "ETB Forces Temporelles", "48,00 EUR", 3),
        ])),
    )
    .await;
    mount_page(&server, 3, html(results_page(&[]))).await;
    mount_page(
        &server,
        1,
        html(results_page(&[
            card(1, "Coffret Dresseur d'Élite 151 Pokémon FR", "79,90 EUR", 1),
            card(2, "ETB Destinées de Paldea neuf", "1.059,00 EUR", 1),
        ])),
    )
    .await;

    let scraper = Scraper::new(test_settings(&server)).unwrap();
    let opts = ScrapeOptions {
        max_pages: 5,
        ..ScrapeOptions::new("pokemon etb")
    };
    let result = scraper.scrape(&opts, &RunContext::new()).await.unwrap();

    // The empty page is fetched and counted, then ends the session
    assert_eq!(result.pages_scraped, 3);
    assert_eq!(result.sales.len(), 4);
    assert!(!result.has_errors());

    let first = &result.sales[0];
    assert_eq!(first.title, "Coffret Dresseur d'Élite 151 Pokémon FR");
    assert_eq!(first.price, 79.90);
    assert_eq!(first.currency, "EUR");
    assert_eq!(first.platform, "ebay");
    assert_eq!(first.url.as_deref(), Some("https://www.ebay.fr/itm/1"));
    assert_eq!(first.metadata.get("condition").map(String::as_str), Some("Neuf"));

    assert_eq!(result.sales[1].price, 1059.0);
}

#[tokio::test]
async fn test_failed_page_is_recorded_and_session_continues() {
    let server = MockServer::start().await;

    mount_page(&server, 2, ResponseTemplate::new(500)).await;
    mount_page(
        &server,
        3,
        html(results_page(&[card(7, "ETB 151", "70,00 EUR", 1)])),
    )
    .await;
    mount_page(
        &server,
        1,
        html(results_page(&[card(6, "Display 151", "250,00 EUR", 1)])),
    )
    .await;

    let scraper = Scraper::new(test_settings(&server)).unwrap();
    let opts = ScrapeOptions {
        max_pages: 3,
        ..ScrapeOptions::new("pokemon")
    };
    let result = scraper.scrape(&opts, &RunContext::new()).await.unwrap();

    assert_eq!(result.pages_scraped, 2);
    assert_eq!(result.sales.len(), 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].page, 2);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let scraper = Scraper::new(test_settings(&server)).unwrap();
    let opts = ScrapeOptions {
        max_pages: 1,
        ..ScrapeOptions::new("pokemon")
    };
    let result = scraper.scrape(&opts, &RunContext::new()).await.unwrap();

    assert_eq!(result.pages_scraped, 0);
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn test_sales_older_than_cutoff_are_dropped() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        1,
        html(results_page(&[
            card(1, "ETB 151 récent", "75,00 EUR", 2),
            card(2, "ETB 151 ancien", "60,00 EUR", 90),
        ])),
    )
    .await;

    let scraper = Scraper::new(test_settings(&server)).unwrap();
    let opts = ScrapeOptions {
        max_pages: 1,
        since: Some(Utc::now() - chrono::Duration::days(30)),
        ..ScrapeOptions::new("etb 151")
    };
    let result = scraper.scrape(&opts, &RunContext::new()).await.unwrap();

    assert_eq!(result.sales.len(), 1);
    assert_eq!(result.sales[0].title, "ETB 151 récent");
}

#[tokio::test]
async fn test_cancelled_session_keeps_partial_result() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        1,
        html(results_page(&[card(1, "ETB 151", "75,00 EUR", 1)])),
    )
    .await;

    let mut settings = test_settings(&server);
    // Long enough that cancellation lands during the wait before page 2
    settings.rate_limit = Duration::from_secs(30);
    let scraper = Scraper::new(settings).unwrap();

    let ctx = RunContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let opts = ScrapeOptions {
        max_pages: 3,
        ..ScrapeOptions::new("etb 151")
    };
    let err = scraper.scrape(&opts, &ctx).await.unwrap_err();
    assert!(matches!(err, ScrapeError::Interrupted { .. }));

    let partial = err.into_partial().unwrap();
    assert_eq!(partial.pages_scraped, 1);
    assert_eq!(partial.sales.len(), 1);
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><body>ok</body></html>".to_string()))
        .mount(&server)
        .await;

    let scraper = Scraper::new(test_settings(&server)).unwrap();
    let status = scraper.health_check(&RunContext::new()).await;

    assert!(status.healthy);
    assert_eq!(status.status_code, Some(200));
    assert_eq!(status.target, "127.0.0.1");
    assert!(status.error.is_none());
}

#[tokio::test]
async fn test_health_check_reports_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let scraper = Scraper::new(test_settings(&server)).unwrap();
    let status = scraper.health_check(&RunContext::new()).await;

    assert!(!status.healthy);
    assert_eq!(status.status_code, Some(503));
    assert!(status.error.is_some());
}
