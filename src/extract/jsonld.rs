//! schema.org JSON-LD extraction.
//!
//! Handles a bare `Movie`, arrays of nodes, `@graph` wrappers, and
//! `ItemList`/`ListItem` search listings. Malformed script blocks are
//! skipped rather than failing the page.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use super::fields::{collapse_whitespace, parse_rating, parse_year};
use crate::types::MovieRecord;

static LD_JSON: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("static selector")
});

pub(super) fn extract(document: &Html, page_url: &Url) -> Option<Vec<MovieRecord>> {
    let mut blocks = Vec::new();
    for script in document.select(&LD_JSON) {
        let raw: String = script.text().collect();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => blocks.push(value),
            Err(e) => tracing::trace!(error = %e, "skipping malformed JSON-LD block"),
        }
    }

    let mut movies = Vec::new();
    for block in &blocks {
        collect_movies(block, &mut movies);
    }

    let records: Vec<MovieRecord> = movies
        .into_iter()
        .filter_map(|node| movie_record(node, page_url))
        .collect();
    (!records.is_empty()).then_some(records)
}

fn collect_movies<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_movies(item, out);
            }
        }
        Value::Object(map) => {
            if has_type(map.get("@type"), "Movie") {
                out.push(value);
                return;
            }
            for key in ["@graph", "itemListElement", "item"] {
                if let Some(nested) = map.get(key) {
                    collect_movies(nested, out);
                }
            }
        }
        _ => {}
    }
}

/// `@type` may be a string or an array of strings.
fn has_type(value: Option<&Value>, wanted: &str) -> bool {
    match value {
        Some(Value::String(t)) => t == wanted,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

fn movie_record(node: &Value, page_url: &Url) -> Option<MovieRecord> {
    let title = collapse_whitespace(node.get("name")?.as_str()?);

    let source_url = node
        .get("url")
        .and_then(Value::as_str)
        .and_then(|u| page_url.join(u).ok())
        .unwrap_or_else(|| page_url.clone());

    let year = ["datePublished", "dateCreated", "releaseDate"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_str))
        .find_map(parse_year);

    let rating = node
        .get("aggregateRating")
        .and_then(|r| r.get("ratingValue"))
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64().map(|f| f as f32),
            Value::String(s) => parse_rating(s),
            _ => None,
        });

    let description = node
        .get("description")
        .and_then(Value::as_str)
        .map(collapse_whitespace)
        .unwrap_or_default();

    let poster = node
        .get("image")
        .and_then(image_url)
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

/// `image` may be a URL string, an `ImageObject`, or an array of either.
fn image_url(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("url").and_then(Value::as_str),
        Value::Array(items) => items.iter().find_map(image_url),
        _ => None,
    }
}
