//! HTML parser for completed-sale result pages
//!
//! This module turns one results page into sale records:
//! - Listing cards with title, price, sold date and link
//! - Per-listing metadata (condition, shipping)
//! - Pagination signals and the advertised result count

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::normalizer::text::strip_diacritics;
use crate::url::clean_listing_url;

pub const PLATFORM: &str = "ebay";
pub const CURRENCY: &str = "EUR";

/// Titles of the promotional card the marketplace injects into results
const PLACEHOLDER_TITLES: &[&str] = &["shop on ebay"];

/// Badges the marketplace prepends to fresh listing titles
const TITLE_BADGES: &[&str] = &["Nouvelle annonce", "New listing"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("listing selector is valid")
}

static ITEM: LazyLock<Selector> = LazyLock::new(|| selector(".s-item"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__title"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__price"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.s-item__link"));
static SOLD_DATE: LazyLock<Selector> =
    LazyLock::new(|| selector(".s-item__title--tag, .POSITIVE"));
static CONDITION: LazyLock<Selector> = LazyLock::new(|| selector(".SECONDARY_INFO"));
static SHIPPING: LazyLock<Selector> = LazyLock::new(|| selector(".s-item__shipping"));
static NEXT_PAGE: LazyLock<Selector> = LazyLock::new(|| selector(".pagination__next"));
static RESULT_COUNT: LazyLock<Selector> =
    LazyLock::new(|| selector(".srp-controls__count-heading"));

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)*)(?:EUR|€)").expect("price regex is valid")
});
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)*").expect("number regex is valid"));
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,2})\s+(janv|jan|fevr|fev|feb|mars|mar|avr|apr|mai|may|juin|jun|juil|jul|aout|aug|sept|sep|oct|nov|dec)[a-z]*\.?(?:\s+(\d{4}))?",
    )
    .expect("date regex is valid")
});
static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}(?:[\s.,]\d{3})+|\d+)\s*(?:resultats?|results?)")
        .expect("result count regex is valid")
});

/// Everything extracted from one results page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Sales in document order
    pub sales: Vec<super::RawSale>,
    pub has_next_page: bool,
    pub next_page_url: Option<String>,
    /// Result count advertised in the page header
    pub total_results: Option<u64>,
}

/// Parses a completed-sales results page
///
/// Cards without a title or a positive price are skipped, as is the
/// promotional placeholder card. Listings without a readable sold date are
/// stamped with `now`.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use url::Url;
/// use resale_scout::crawler::parse_listing_page;
///
/// let html = r#"<ul><li class="s-item">
///   <div class="s-item__title">ETB 151</div>
///   <span class="s-item__price">59,90 EUR</span>
/// </li></ul>"#;
/// let page_url = Url::parse("https://www.ebay.fr/sch/i.html").unwrap();
/// let parsed = parse_listing_page(html, &page_url, Utc::now());
/// assert_eq!(parsed.sales.len(), 1);
/// assert_eq!(parsed.sales[0].price, 59.90);
/// ```
pub fn parse_listing_page(html: &str, page_url: &Url, now: DateTime<Utc>) -> ParsedPage {
    let document = Html::parse_document(html);

    let sales = document
        .select(&ITEM)
        .filter_map(|item| parse_item(item, page_url, now))
        .collect();

    let next = document.select(&NEXT_PAGE).next();
    let has_next_page = next.is_some_and(|el| el.value().attr("aria-disabled") != Some("true"));
    let next_page_url = next
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .map(|u| u.to_string());

    let total_results = document
        .select(&RESULT_COUNT)
        .next()
        .and_then(|el| parse_result_count(&element_text(el)));

    ParsedPage {
        sales,
        has_next_page,
        next_page_url,
        total_results,
    }
}

fn parse_item(item: ElementRef<'_>, page_url: &Url, now: DateTime<Utc>) -> Option<super::RawSale> {
    let title = clean_title(&first_text(item, &TITLE)?);
    if title.is_empty() || is_placeholder(&title) {
        return None;
    }

    let price = parse_price(&first_text(item, &PRICE)?)?;

    let sold_at = item
        .select(&SOLD_DATE)
        .find_map(|el| parse_sold_date(&element_text(el), now))
        .unwrap_or(now);

    let url = item
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| clean_listing_url(href, page_url));

    let mut metadata = BTreeMap::new();
    if let Some(condition) = first_text(item, &CONDITION) {
        metadata.insert("condition".to_string(), condition);
    }
    if let Some(shipping) = first_text(item, &SHIPPING) {
        metadata.insert("shipping".to_string(), shipping);
    }

    Some(super::RawSale {
        title,
        price,
        currency: CURRENCY.to_string(),
        sold_at,
        url,
        platform: PLATFORM.to_string(),
        metadata,
    })
}

/// Extracts a price in euros from listing price text
///
/// Handles decimal commas, thousands separators, non-breaking spaces, and
/// range prices ("100 à 150 €"), for which the lower bound is returned.
/// Returns None unless the price is positive.
pub fn parse_price(text: &str) -> Option<f64> {
    let lower_bound = text.split('à').next().unwrap_or(text);
    let compact: String = lower_bound
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    let token = PRICE_RE
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .or_else(|| NUMBER_RE.find(&compact))?
        .as_str();

    let price = parse_decimal(token)?;
    (price.is_finite() && price > 0.0).then_some(price)
}

/// Reads "1.234,56", "159,99" or "100" as a number
///
/// The last separator is decimal only when at most two digits follow it.
fn parse_decimal(token: &str) -> Option<f64> {
    let normalized = match token.rfind([',', '.']) {
        Some(pos) if token.len() - pos - 1 <= 2 => {
            let (int_part, frac_part) = token.split_at(pos);
            format!("{}.{}", int_part.replace([',', '.'], ""), &frac_part[1..])
        }
        _ => token.replace([',', '.'], ""),
    };
    normalized.parse().ok()
}

/// Parses a localized sold-date fragment such as "Vendu le 12 oct. 2024"
///
/// Month names may be abbreviated, accented or not, with or without a
/// trailing period. A date without a year takes the year of `now`. Any date
/// after today moves back one year, and one still in the future is clamped
/// to `now`.
pub fn parse_sold_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let folded = strip_diacritics(&text.to_lowercase());
    let caps = DATE_RE.captures(&folded)?;

    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_number(caps.get(2)?.as_str())?;
    let today = now.date_naive();

    let year = match caps.get(3) {
        Some(year) => year.as_str().parse().ok()?,
        None => today.year(),
    };
    let mut date = NaiveDate::from_ymd_opt(year, month, day)?;
    if date > today {
        match NaiveDate::from_ymd_opt(year - 1, month, day) {
            Some(previous) if previous <= today => date = previous,
            _ => return Some(now),
        }
    }

    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn month_number(token: &str) -> Option<u32> {
    let month = match token {
        "janv" | "jan" => 1,
        "fevr" | "fev" | "feb" => 2,
        "mars" | "mar" => 3,
        "avr" | "apr" => 4,
        "mai" | "may" => 5,
        "juin" | "jun" => 6,
        "juil" | "jul" => 7,
        "aout" | "aug" => 8,
        "sept" | "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Reads the advertised result count, e.g. "1 234 résultats"
pub fn parse_result_count(text: &str) -> Option<u64> {
    let folded = strip_diacritics(&text.to_lowercase());
    let caps = COUNT_RE.captures(&folded)?;
    let digits: String = caps.get(1)?.as_str().chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn first_text(item: ElementRef<'_>, selector: &Selector) -> Option<String> {
    item.select(selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

/// Element text with whitespace runs collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_title(title: &str) -> String {
    let mut title = title.trim();
    for badge in TITLE_BADGES {
        if let Some(rest) = title.strip_prefix(badge) {
            title = rest.trim_start();
        }
    }
    title.to_string()
}

fn is_placeholder(title: &str) -> bool {
    PLACEHOLDER_TITLES
        .iter()
        .any(|p| title.eq_ignore_ascii_case(p))
}
