use url::Url;

/// Resolves a listing href and strips it down to its canonical path
///
/// Listing links carry click-tracking query strings and fragments that vary
/// per impression. Both are dropped so the same listing always yields the same
/// URL, which is what sales are deduplicated on.
///
/// Returns None for empty hrefs and anything that isn't HTTP(S).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use resale_scout::url::clean_listing_url;
///
/// let base = Url::parse("https://www.ebay.fr/sch/i.html").unwrap();
/// let url = clean_listing_url("/itm/1234?hash=abc&_trksid=p1#x", &base).unwrap();
/// assert_eq!(url, "https://www.ebay.fr/itm/1234");
/// ```
pub fn clean_listing_url(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}
