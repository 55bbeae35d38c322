//! Defensive parsers for loosely formatted scraped fields.
//!
//! Every function here is total: garbage in yields `None` (or an empty
//! string), never a panic and never an out-of-range value.

use scraper::ElementRef;

use crate::types::{RATING_RANGE, YEAR_RANGE};

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element, whitespace-collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// `content` attribute if present (microdata `<meta>`), else visible text.
pub fn element_value(element: ElementRef<'_>) -> String {
    match element.value().attr("content") {
        Some(content) => collapse_whitespace(content),
        None => element_text(element),
    }
}

/// First standalone four-digit number that is a plausible release year.
///
/// `"2010"`, `"(2010)"`, `"2010-07-16"` and `"Released 2010"` all yield
/// 2010; `"20100"` and `"TBA"` yield `None`.
pub fn parse_year(raw: &str) -> Option<u16> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i - start == 4 {
            if let Ok(year) = raw[start..i].parse::<u16>() {
                if YEAR_RANGE.contains(&year) {
                    return Some(year);
                }
            }
        }
    }
    None
}

/// First decimal number in `raw`, if it is a valid rating.
///
/// Accepts `.` or `,` as the decimal separator, so `"8.8"`, `"8,8"`,
/// `"8.8/10"` and `"Rating: 8.8"` all yield 8.8, and `".5"` yields 0.5.
/// Negative numbers and values outside `0.0..=10.0` are dropped.
pub fn parse_rating(raw: &str) -> Option<f32> {
    let bytes = raw.as_bytes();
    let is_separator = |b: u8| b == b'.' || b == b',';
    let start = (0..bytes.len()).find(|&i| {
        bytes[i].is_ascii_digit()
            || (is_separator(bytes[i]) && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
    })?;
    if start > 0 && bytes[start - 1] == b'-' {
        return None;
    }

    let mut number = String::from("0");
    let mut seen_separator = false;
    for &b in &bytes[start..] {
        match b {
            b'0'..=b'9' => number.push(char::from(b)),
            b'.' | b',' if !seen_separator => {
                seen_separator = true;
                number.push('.');
            }
            _ => break,
        }
    }
    let number = number.trim_end_matches('.');
    let rating = number.parse::<f32>().ok()?;
    (rating.is_finite() && RATING_RANGE.contains(&rating)).then_some(rating)
}

/// Split a trailing `(YYYY)` off a title.
///
/// `"Inception (2010)"` becomes `("Inception", Some(2010))`; titles without
/// a parenthesised year come back unchanged.
pub fn split_title_year(raw: &str) -> (String, Option<u16>) {
    let title = collapse_whitespace(raw);
    if let Some(stripped) = title.strip_suffix(')') {
        if let Some(open) = stripped.rfind('(') {
            let inner = &stripped[open + 1..];
            if inner.len() == 4 && inner.bytes().all(|b| b.is_ascii_digit()) {
                let year = parse_year(inner);
                let head = stripped[..open].trim_end();
                if year.is_some() && !head.is_empty() {
                    return (head.to_string(), year);
                }
            }
        }
    }
    (title, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_forms() {
        assert_eq!(parse_year("2010"), Some(2010));
        assert_eq!(parse_year("(2010)"), Some(2010));
        assert_eq!(parse_year("2010-07-16"), Some(2010));
        assert_eq!(parse_year("Released 16 July 2010"), Some(2010));
        assert_eq!(parse_year("20100"), None);
        assert_eq!(parse_year("TBA"), None);
        assert_eq!(parse_year("0042"), None);
        assert_eq!(parse_year("9999"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn year_skips_implausible_runs() {
        assert_eq!(parse_year("1000 Days, 2004"), Some(2004));
    }

    #[test]
    fn rating_forms() {
        assert_eq!(parse_rating("8.8"), Some(8.8));
        assert_eq!(parse_rating("8,8"), Some(8.8));
        assert_eq!(parse_rating("8.8/10"), Some(8.8));
        assert_eq!(parse_rating("Rating: 7.1 (1.2M votes)"), Some(7.1));
        assert_eq!(parse_rating("9"), Some(9.0));
        assert_eq!(parse_rating("9."), Some(9.0));
    }

    #[test]
    fn rating_garbage_is_none() {
        assert_eq!(parse_rating("N/A"), None);
        assert_eq!(parse_rating(""), None);
        assert_eq!(parse_rating("88%"), None);
        assert_eq!(parse_rating("10.5"), None);
        assert_eq!(parse_rating("-3"), None);
        assert_eq!(parse_rating("Rating: -0.5"), None);
    }

    #[test]
    fn rating_leading_separator_is_a_fraction() {
        assert_eq!(parse_rating(".5"), Some(0.5));
        assert_eq!(parse_rating(",5/10"), Some(0.5));
    }

    #[test]
    fn title_year_suffix() {
        assert_eq!(
            split_title_year("Inception (2010)"),
            ("Inception".to_string(), Some(2010))
        );
        assert_eq!(
            split_title_year("  Blade   Runner (1982) "),
            ("Blade Runner".to_string(), Some(1982))
        );
        assert_eq!(split_title_year("Heat"), ("Heat".to_string(), None));
        assert_eq!(
            split_title_year("Apollo (13)"),
            ("Apollo (13)".to_string(), None)
        );
        assert_eq!(split_title_year("(2010)"), ("(2010)".to_string(), None));
    }

    #[test]
    fn whitespace_collapse() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace(""), "");
    }
}
