//! Extraction strategies, tried in priority order by the extractor.

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::fields::{element_text, element_value, parse_rating, parse_year, split_title_year};
use super::jsonld;
use crate::types::MovieRecord;
use crate::{CinescrapeError, Result};

/// CSS selectors for a search-results list page.
///
/// The defaults cover common result markup (class names plus schema.org
/// microdata). Override them in configuration when the upstream site
/// renames its classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Wrapper around the result items.
    pub container: String,
    /// One result.
    pub item: String,
    /// Title element within an item.
    pub title: String,
    /// Link to the detail page within an item.
    pub link: String,
    pub year: String,
    pub rating: String,
    pub description: String,
    /// Poster `<img>` within an item.
    pub poster: String,
    /// Marker the site renders when nothing matched.
    pub no_results: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            container: ".search-results, [data-search-results]".into(),
            item: ".result-item, [data-movie]".into(),
            title: ".result-title, [itemprop=name]".into(),
            link: "a[href]".into(),
            year: ".result-year, [itemprop=datePublished]".into(),
            rating: ".result-rating, [itemprop=ratingValue]".into(),
            description: ".result-description, [itemprop=description]".into(),
            poster: "img".into(),
            no_results: ".no-results, [data-no-results]".into(),
        }
    }
}

pub(crate) fn compile(name: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        CinescrapeError::Configuration(format!("invalid {name} selector {css:?}: {e}"))
    })
}

/// Compiled form of [`SelectorConfig`] (minus the no-results marker,
/// which belongs to the extractor rather than any one strategy).
#[derive(Debug, Clone)]
pub struct ResultListSelectors {
    container: Selector,
    item: Selector,
    title: Selector,
    link: Selector,
    year: Selector,
    rating: Selector,
    description: Selector,
    poster: Selector,
}

impl ResultListSelectors {
    pub fn compile(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            container: compile("container", &config.container)?,
            item: compile("item", &config.item)?,
            title: compile("title", &config.title)?,
            link: compile("link", &config.link)?,
            year: compile("year", &config.year)?,
            rating: compile("rating", &config.rating)?,
            description: compile("description", &config.description)?,
            poster: compile("poster", &config.poster)?,
        })
    }
}

/// One way of reading movie records out of a page.
///
/// [`extract()`](Self::extract) returns `None` when the strategy does not
/// recognize the page, so the next one can be tried. `Some(vec![])` means
/// the page was recognized and explicitly lists zero results.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Search-results list located by CSS selectors.
    ResultList(ResultListSelectors),
    /// schema.org `Movie` objects in `application/ld+json` scripts.
    JsonLd,
    /// OpenGraph tags on a single-movie detail page.
    OpenGraph,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::ResultList(_) => "result_list",
            Strategy::JsonLd => "json_ld",
            Strategy::OpenGraph => "open_graph",
        }
    }

    pub fn extract(&self, document: &Html, page_url: &Url) -> Option<Vec<MovieRecord>> {
        match self {
            Strategy::ResultList(selectors) => extract_result_list(selectors, document, page_url),
            Strategy::JsonLd => jsonld::extract(document, page_url),
            Strategy::OpenGraph => extract_open_graph(document, page_url),
        }
    }
}

fn extract_result_list(
    selectors: &ResultListSelectors,
    document: &Html,
    page_url: &Url,
) -> Option<Vec<MovieRecord>> {
    let container = document.select(&selectors.container).next();
    let items: Vec<ElementRef<'_>> = match container {
        Some(container) => container.select(&selectors.item).collect(),
        // container renamed: accept items found anywhere on the page
        None => document.select(&selectors.item).collect(),
    };

    if items.is_empty() {
        // only a bare container is an explicit empty list; anything inside it
        // that is not an item means the item markup drifted
        return container
            .filter(|c| c.children().all(|child| !child.value().is_element()))
            .map(|_| Vec::new());
    }

    let records: Vec<MovieRecord> = items
        .into_iter()
        .filter_map(|item| result_item(selectors, item, page_url))
        .collect();

    // items without a single extractable title mean the item markup drifted
    (!records.is_empty()).then_some(records)
}

fn result_item(
    selectors: &ResultListSelectors,
    item: ElementRef<'_>,
    page_url: &Url,
) -> Option<MovieRecord> {
    let link = item.select(&selectors.link).next();

    let raw_title = item
        .select(&selectors.title)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .or_else(|| link.map(element_text).filter(|t| !t.is_empty()))?;
    let (title, title_year) = split_title_year(&raw_title);

    let source_url = link
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone());

    let year = item
        .select(&selectors.year)
        .next()
        .and_then(|e| parse_year(&element_value(e)))
        .or(title_year);

    let rating = item
        .select(&selectors.rating)
        .next()
        .map(element_value)
        .or_else(|| item.value().attr("data-rating").map(str::to_string))
        .and_then(|r| parse_rating(&r));

    let description = item
        .select(&selectors.description)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let poster = item
        .select(&selectors.poster)
        .next()
        .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
        .and_then(|src| page_url.join(src).ok())
        .map(String::from);

    Some(
        MovieRecord::new(title, source_url.as_str())?
            .with_year(year)
            .with_rating(rating)
            .with_description(description)
            .with_poster(poster),
    )
}

static META: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("static selector"));
static RATING_VALUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop=ratingValue]").expect("static selector"));

fn extract_open_graph(document: &Html, page_url: &Url) -> Option<Vec<MovieRecord>> {
    let mut og: HashMap<&str, &str> = HashMap::new();
    for meta in document.select(&META) {
        let value = meta.value();
        let key = value.attr("property").or_else(|| value.attr("name"));
        if let (Some(key), Some(content)) = (key, value.attr("content")) {
            // first occurrence wins
            og.entry(key).or_insert(content);
        }
    }

    if !og.get("og:type")?.starts_with("video.movie") {
        return None;
    }

    let (title, title_year) = split_title_year(og.get("og:title")?);
    let source_url = og
        .get("og:url")
        .and_then(|u| page_url.join(u).ok())
        .unwrap_or_else(|| page_url.clone());
    let year = og
        .get("video:release_date")
        .and_then(|d| parse_year(d))
        .or(title_year);
    let rating = document
        .select(&RATING_VALUE)
        .next()
        .and_then(|e| parse_rating(&element_value(e)));
    let poster = og
        .get("og:image")
        .and_then(|src| page_url.join(src).ok())
        .map(String::from);

    let record = MovieRecord::new(title, source_url.as_str())?
        .with_year(year)
        .with_rating(rating)
        .with_description(og.get("og:description").copied().unwrap_or_default())
        .with_poster(poster);
    Some(vec![record])
}
