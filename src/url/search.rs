use url::Url;

use crate::{UrlError, UrlResult};

/// Search results path on the marketplace
pub const SEARCH_PATH: &str = "/sch/i.html";

/// Listings per results page
pub const PAGE_SIZE: u32 = 100;

/// Trading-card category used when no known filter token is given
pub const DEFAULT_CATEGORY_ID: &str = "183454";

/// Filter tokens accepted on the command line, with their category ids
///
/// The marketplace files every sealed and single product under one trading
/// card category, so all tokens currently resolve to the same id.
const CATEGORY_IDS: &[(&str, &str)] = &[
    ("all", DEFAULT_CATEGORY_ID),
    ("display", DEFAULT_CATEGORY_ID),
    ("etb", DEFAULT_CATEGORY_ID),
    ("collection", DEFAULT_CATEGORY_ID),
    ("booster", DEFAULT_CATEGORY_ID),
    ("bundle", DEFAULT_CATEGORY_ID),
    ("tin", DEFAULT_CATEGORY_ID),
    ("single", DEFAULT_CATEGORY_ID),
];

/// Sort orders supported by the results page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    EndedRecently,
    PriceLowest,
    PriceHighest,
}

impl SortOrder {
    /// Value of the `_sop` query parameter
    pub fn code(&self) -> &'static str {
        match self {
            Self::EndedRecently => "13",
            Self::PriceLowest => "15",
            Self::PriceHighest => "16",
        }
    }
}

/// Resolves a caller-supplied filter token to a category id
///
/// Unknown or missing tokens fall back to [`DEFAULT_CATEGORY_ID`]. The caller's
/// text never reaches the URL.
pub fn category_id(token: Option<&str>) -> &'static str {
    let Some(token) = token else {
        return DEFAULT_CATEGORY_ID;
    };
    let token = token.trim().to_lowercase();
    CATEGORY_IDS
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, id)| *id)
        .unwrap_or(DEFAULT_CATEGORY_ID)
}

/// Parameters for one results page
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub category: Option<&'a str>,
    pub sort: SortOrder,
    pub page: u32,
}

/// Builds the completed-sales search URL for one page
///
/// The page parameter is only sent from page 2 onward.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use resale_scout::url::{build_search_url, SearchRequest, SortOrder};
///
/// let base = Url::parse("https://www.ebay.fr").unwrap();
/// let url = build_search_url(&base, &SearchRequest {
///     query: "display 151",
///     category: None,
///     sort: SortOrder::EndedRecently,
///     page: 2,
/// }).unwrap();
/// assert!(url.as_str().contains("_nkw=display+151"));
/// assert!(url.as_str().contains("_pgn=2"));
/// ```
pub fn build_search_url(base: &Url, request: &SearchRequest<'_>) -> UrlResult<Url> {
    let mut url = base
        .join(SEARCH_PATH)
        .map_err(|e| UrlError::Parse(e.to_string()))?;

    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .clear()
            .append_pair("_nkw", request.query)
            .append_pair("_sacat", category_id(request.category))
            .append_pair("LH_Complete", "1")
            .append_pair("LH_Sold", "1")
            .append_pair("_sop", request.sort.code())
            .append_pair("_ipg", &PAGE_SIZE.to_string());
        if request.page > 1 {
            pairs.append_pair("_pgn", &request.page.to_string());
        }
    }

    Ok(url)
}
