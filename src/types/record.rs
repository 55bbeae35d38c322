//! Structured movie records extracted from scraped pages.

use serde::{Deserialize, Serialize};

/// Lowest and highest plausible release years.
pub const YEAR_RANGE: std::ops::RangeInclusive<u16> = 1870..=2100;

/// Inclusive bounds of a rating.
pub const RATING_RANGE: std::ops::RangeInclusive<f32> = 0.0..=10.0;

/// A structured result for one title.
///
/// The title is never empty: [`MovieRecord::new`] refuses blank titles, and
/// a page that yields no titled record is a parse failure, not an empty
/// record. Year and rating are `None` rather than out of range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub title: String,
    pub year: Option<u16>,
    pub rating: Option<f32>,
    pub description: String,
    pub poster_url: Option<String>,
    pub source_url: String,
}

impl MovieRecord {
    /// Create a record, or `None` if `title` is blank.
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Option<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            title,
            year: None,
            rating: None,
            description: String::new(),
            poster_url: None,
            source_url: source_url.into(),
        })
    }

    /// Set the release year, dropping values outside [`YEAR_RANGE`].
    pub fn with_year(mut self, year: Option<u16>) -> Self {
        self.year = year.filter(|y| YEAR_RANGE.contains(y));
        self
    }

    /// Set the rating, dropping non-finite or out-of-range values.
    pub fn with_rating(mut self, rating: Option<f32>) -> Self {
        self.rating = rating.filter(|r| r.is_finite() && RATING_RANGE.contains(r));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_poster(mut self, poster_url: Option<String>) -> Self {
        self.poster_url = poster_url;
        self
    }
}
