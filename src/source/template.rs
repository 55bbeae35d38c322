//! Search URL templates.

use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::types::QueryKey;
use crate::{CinescrapeError, Result};

/// Placeholder replaced by the encoded query key.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Upstream search URL with a `{query}` placeholder.
///
/// Validated on construction, so a malformed template is a startup error
/// and [`for_query()`](Self::for_query) only fails on pathological keys.
///
/// ```rust
/// # use cinescrape::source::SearchUrlTemplate;
/// # use cinescrape::normalize;
/// let template = SearchUrlTemplate::new("https://movies.example/search?q={query}").unwrap();
/// let url = template.for_query(&normalize("Inception 2010")).unwrap();
/// assert_eq!(url.as_str(), "https://movies.example/search?q=inception+2010");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchUrlTemplate {
    template: String,
}

impl SearchUrlTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(QUERY_PLACEHOLDER) {
            return Err(CinescrapeError::Configuration(format!(
                "search URL template {template:?} has no {QUERY_PLACEHOLDER} placeholder"
            )));
        }

        let sample = Url::parse(&template.replace(QUERY_PLACEHOLDER, "sample")).map_err(|e| {
            CinescrapeError::Configuration(format!("invalid search URL template {template:?}: {e}"))
        })?;
        if !matches!(sample.scheme(), "http" | "https") {
            return Err(CinescrapeError::Configuration(format!(
                "search URL template {template:?} must use http or https"
            )));
        }

        Ok(Self { template })
    }

    /// Build the search URL for a key.
    pub fn for_query(&self, key: &QueryKey) -> Result<Url> {
        let encoded: String = byte_serialize(key.as_str().as_bytes()).collect();
        let raw = self.template.replace(QUERY_PLACEHOLDER, &encoded);
        Url::parse(&raw)
            .map_err(|e| CinescrapeError::Configuration(format!("invalid search URL {raw:?}: {e}")))
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}
