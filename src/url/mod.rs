//! URL handling for Resale-Scout
//!
//! This module builds search-result URLs, cleans listing links, and checks
//! hosts against the session allow-list.

mod matcher;
mod normalize;
mod search;

pub use matcher::{extract_domain, HostAllowList};
pub use normalize::clean_listing_url;
pub use search::{
    build_search_url, category_id, SearchRequest, SortOrder, DEFAULT_CATEGORY_ID, PAGE_SIZE,
    SEARCH_PATH,
};
