//! Query keys and the normalizer that produces them.

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalized, cache-lookup form of a free-text movie query.
///
/// Only [`normalize`] constructs keys from user input, so two inputs that
/// differ in case, whitespace, or diacritics always map to the same key.
/// The empty key is valid; it simply never names a meaningful entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueryKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize raw user text into a [`QueryKey`].
///
/// Applies compatibility decomposition (NFKD), drops combining marks,
/// applies full Unicode case folding, and collapses every whitespace run into a single space with
/// no leading or trailing space. Total and deterministic: every input,
/// including the empty string, produces a key.
///
/// ```rust
/// # use cinescrape::normalize;
/// assert_eq!(normalize("  Amélie   POULAIN ").as_str(), "amelie poulain");
/// ```
pub fn normalize(raw: &str) -> QueryKey {
    let stripped: String = raw.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // folding can reintroduce decomposable characters, so strip once more
    let folded: String = caseless::default_case_fold_str(&stripped)
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let mut key = String::with_capacity(folded.len());
    for word in folded.split_whitespace() {
        if !key.is_empty() {
            key.push(' ');
        }
        key.push_str(word);
    }
    QueryKey(key)
}
