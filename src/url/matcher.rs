use url::Url;

use crate::{UrlError, UrlResult};

/// Set of hosts a crawl session may contact
///
/// Patterns are either exact hosts ("ebay.fr") or wildcards ("*.ebay.fr").
/// A wildcard matches the bare host and any subdomain of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAllowList {
    patterns: Vec<String>,
}

impl HostAllowList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if `host` (any case) matches one of the patterns
    pub fn allows(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.patterns.iter().any(|p| matches_wildcard(p, &host))
    }

    /// Fails unless the URL's host is in the allow-list
    ///
    /// # Examples
    ///
    /// ```
    /// use url::Url;
    /// use resale_scout::url::HostAllowList;
    ///
    /// let hosts = HostAllowList::new(["*.ebay.fr"]);
    /// assert!(hosts.check(&Url::parse("https://www.ebay.fr/sch/i.html").unwrap()).is_ok());
    /// assert!(hosts.check(&Url::parse("https://ebay.com/").unwrap()).is_err());
    /// ```
    pub fn check(&self, url: &Url) -> UrlResult<()> {
        let host = extract_domain(url).ok_or(UrlError::MissingDomain)?;
        if self.allows(&host) {
            Ok(())
        } else {
            Err(UrlError::HostNotAllowed(host))
        }
    }
}

/// Lowercase host of a URL, if it has one
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}
