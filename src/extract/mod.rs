//! HTML → [`MovieRecord`] extraction.
//!
//! The upstream markup is treated as an unreliable, versioned format. The
//! [`Extractor`] runs an ordered chain of [`Strategy`] variants:
//!
//! 1. [`Strategy::ResultList`]: configurable CSS selectors for a search
//!    results list (primary)
//! 2. [`Strategy::JsonLd`]: schema.org `Movie` data embedded in the page
//! 3. [`Strategy::OpenGraph`]: a single-movie detail page
//!
//! The first strategy that recognizes the page wins. If none does, the page
//! is either an explicit "no results" page ([`ParseError::NoMatch`]) or its
//! structure changed ([`ParseError::StructureChanged`]). Drift therefore
//! degrades to an error instead of producing malformed records.
//!
//! Parsing is pure: the same bytes always yield the same records.

pub mod fields;
mod jsonld;
pub mod strategy;

use scraper::{Html, Selector};
use url::Url;

use crate::Result;
use crate::error::ParseError;
use crate::telemetry;
use crate::types::MovieRecord;

pub use strategy::{ResultListSelectors, SelectorConfig, Strategy};

/// Ordered strategy chain plus the "no results" marker.
#[derive(Debug, Clone)]
pub struct Extractor {
    strategies: Vec<Strategy>,
    no_results: Selector,
}

impl Extractor {
    /// Build the default chain with the given primary selectors.
    ///
    /// Fails only if a selector does not compile.
    pub fn new(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            strategies: vec![
                Strategy::ResultList(ResultListSelectors::compile(config)?),
                Strategy::JsonLd,
                Strategy::OpenGraph,
            ],
            no_results: strategy::compile("no_results", &config.no_results)?,
        })
    }

    /// Build an extractor with a custom strategy order.
    pub fn with_strategies(strategies: Vec<Strategy>, no_results_css: &str) -> Result<Self> {
        Ok(Self {
            strategies,
            no_results: strategy::compile("no_results", no_results_css)?,
        })
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Parse a fetched page.
    ///
    /// `page_url` resolves relative links and is the fallback `source_url`.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn parse(
        &self,
        html: &[u8],
        page_url: &Url,
    ) -> std::result::Result<Vec<MovieRecord>, ParseError> {
        let text = String::from_utf8_lossy(html);
        let document = Html::parse_document(&text);

        for strategy in &self.strategies {
            if let Some(records) = strategy.extract(&document, page_url) {
                tracing::debug!(
                    strategy = strategy.name(),
                    records = records.len(),
                    url = %page_url,
                    "page recognized"
                );
                return Ok(records);
            }
        }

        let err = if document.select(&self.no_results).next().is_some() {
            ParseError::NoMatch
        } else {
            ParseError::StructureChanged
        };
        let kind = match err {
            ParseError::NoMatch => "no_match",
            ParseError::StructureChanged => "structure_changed",
        };
        metrics::counter!(telemetry::PARSE_FAILURES_TOTAL, "kind" => kind).increment(1);
        Err(err)
    }
}
