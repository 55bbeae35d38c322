//! User-facing reply texts.

use std::fmt::Write;

use crate::types::{ChatId, MovieRecord, OutboundMessage, QueryKey};

pub const HELP: &str = "Send me a movie title (optionally with a year) and I'll look it up.\n\
     \"next\" shows the next match, \"/refresh <title>\" searches again from scratch.";
pub const STILL_SEARCHING: &str = "Still searching, one moment please.";
pub const TRY_AGAIN_LATER: &str = "The movie site isn't answering right now. Please try again later.";
pub const NO_MORE_RESULTS: &str = "No more results.";
pub const NOTHING_TO_PAGE: &str = "Send me a movie title first.";

pub fn help(chat_id: ChatId) -> OutboundMessage {
    OutboundMessage::text(chat_id, HELP)
}

pub fn still_searching(chat_id: ChatId) -> OutboundMessage {
    OutboundMessage::text(chat_id, STILL_SEARCHING)
}

pub fn try_again_later(chat_id: ChatId) -> OutboundMessage {
    OutboundMessage::text(chat_id, TRY_AGAIN_LATER)
}

pub fn no_more_results(chat_id: ChatId) -> OutboundMessage {
    OutboundMessage::text(chat_id, NO_MORE_RESULTS)
}

pub fn nothing_to_page(chat_id: ChatId) -> OutboundMessage {
    OutboundMessage::text(chat_id, NOTHING_TO_PAGE)
}

pub fn no_results(chat_id: ChatId, key: &QueryKey) -> OutboundMessage {
    OutboundMessage::text(chat_id, format!("No results found for \"{key}\"."))
}

/// Format `records[cursor]`, with a pager hint when there are several.
///
/// `cursor` must be in bounds.
pub fn record(chat_id: ChatId, records: &[MovieRecord], cursor: usize) -> OutboundMessage {
    let record = &records[cursor];
    let mut text = record.title.clone();
    if let Some(year) = record.year {
        let _ = write!(text, " ({year})");
    }
    if let Some(rating) = record.rating {
        let _ = write!(text, "\nRating: {rating:.1}/10");
    }
    if !record.description.is_empty() {
        let _ = write!(text, "\n\n{}", record.description);
    }
    let _ = write!(text, "\n\n{}", record.source_url);
    if records.len() > 1 {
        let _ = write!(
            text,
            "\n({}/{}) Send \"next\" for more.",
            cursor + 1,
            records.len()
        );
    }
    OutboundMessage::text(chat_id, text).with_image(record.poster_url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inception() -> MovieRecord {
        MovieRecord::new("Inception", "https://movies.example/title/1")
            .unwrap()
            .with_year(Some(2010))
            .with_rating(Some(8.8))
            .with_description("A thief who steals corporate secrets.")
            .with_poster(Some("https://movies.example/p/1.jpg".into()))
    }

    #[test]
    fn single_record_has_no_pager() {
        let msg = record(ChatId(1), &[inception()], 0);
        assert!(msg.text.starts_with("Inception (2010)\nRating: 8.8/10"));
        assert!(msg.text.contains("https://movies.example/title/1"));
        assert!(!msg.text.contains("(1/1)"));
        assert_eq!(msg.image_url.as_deref(), Some("https://movies.example/p/1.jpg"));
    }

    #[test]
    fn pager_hint_counts_from_one() {
        let other =
            MovieRecord::new("Inception: The Cobol Job", "https://movies.example/t/2").unwrap();
        let msg = record(ChatId(1), &[inception(), other], 1);
        assert!(msg.text.starts_with("Inception: The Cobol Job"));
        assert!(msg.text.contains("(2/2)"));
        assert!(msg.image_url.is_none());
    }

    #[test]
    fn no_results_names_the_query() {
        let msg = no_results(ChatId(1), &crate::types::normalize("Zzyzx"));
        assert_eq!(msg.text, "No results found for \"zzyzx\".");
    }
}
