//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building per-session clients with a rotated user agent
//! - Refusing hosts outside the session allow-list, redirects included
//! - Classifying failures as transient or permanent for the retryer

use std::time::Duration;

use reqwest::{redirect::Policy, Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::url::HostAllowList;

/// Redirect hops followed before a request fails
const MAX_REDIRECTS: usize = 5;

/// Failure of one page fetch
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("Host not in allow-list: {url}")]
    HostNotAllowed { url: String },

    #[error("Page not found (404): {url}")]
    NotFound { url: String },

    #[error("Rate limited (429): {url}")]
    RateLimited { url: String },

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Returns true if the same request may succeed when retried
    ///
    /// | Condition | Transient |
    /// |-----------|-----------|
    /// | Host outside allow-list | no |
    /// | HTTP 404 | no |
    /// | HTTP 429, 403, 408 | yes |
    /// | Other 4xx | no |
    /// | HTTP 5xx | yes |
    /// | Timeout, connection, body read | yes |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HostNotAllowed { .. } | Self::NotFound { .. } => false,
            Self::RateLimited { .. } | Self::Timeout { .. } => true,
            Self::Connect { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => matches!(status, 403 | 408 | 500..=599),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub body: String,
}

/// Settings for one session's HTTP client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub user_agent: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ClientSettings {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Builds an HTTP client for one crawl session
///
/// Redirects are followed only while they stay on allowed hosts; a redirect
/// elsewhere stops and surfaces as a 3xx status.
///
/// # Example
///
/// ```no_run
/// use resale_scout::crawler::{build_http_client, ClientSettings};
/// use resale_scout::url::HostAllowList;
///
/// let hosts = HostAllowList::new(["*.ebay.fr"]);
/// let client = build_http_client(&ClientSettings::new("Mozilla/5.0"), &hosts).unwrap();
/// ```
pub fn build_http_client(
    settings: &ClientSettings,
    allowed_hosts: &HostAllowList,
) -> Result<Client, reqwest::Error> {
    let allowed = allowed_hosts.clone();
    let redirect_policy = Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if attempt.url().host_str().is_some_and(|h| allowed.allows(h)) {
            attempt.follow()
        } else {
            attempt.stop()
        }
    });

    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(settings.request_timeout)
        .connect_timeout(settings.connect_timeout)
        .redirect(redirect_policy)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one page and classifies the outcome
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    allowed_hosts: &HostAllowList,
) -> Result<FetchedPage, FetchError> {
    if allowed_hosts.check(url).is_err() {
        return Err(FetchError::HostNotAllowed {
            url: url.to_string(),
        });
    }

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| classify_request_error(url, e))?;

    let status = response.status();
    let final_url = response.url().clone();

    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound {
            url: url.to_string(),
        });
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| classify_request_error(url, e))?;

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        body,
    })
}

fn classify_request_error(url: &Url, e: reqwest::Error) -> FetchError {
    let url = url.to_string();
    if e.is_timeout() {
        FetchError::Timeout { url }
    } else if e.is_connect() {
        FetchError::Connect {
            url,
            message: e.to_string(),
        }
    } else {
        FetchError::Network {
            url,
            message: e.to_string(),
        }
    }
}
