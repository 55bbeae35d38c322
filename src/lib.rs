//! Cinescrape - movie lookup chat core
//!
//! Turns free-text movie queries from a chat into structured movie records.
//! Results are scraped from a public movie search page, parsed into
//! [`MovieRecord`]s, and cached so repeat queries never hit the upstream
//! site twice within the TTL.
//!
//! ```text
//! chat text ─► normalize ─► ResultCache ─miss─► PageSource ─► Extractor
//!                               │                                │
//!                               ◄──────────── put ───────────────┘
//!                               ▼
//!                   ConversationController ─► OutboundMessage
//! ```
//!
//! The chat transport is not part of this crate: feed inbound messages to
//! [`ConversationController::handle_message()`] and deliver whatever it
//! returns.
//!
//! # Example
//!
//! ```rust,no_run
//! use cinescrape::{ChatId, Cinescrape, ConversationController, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> cinescrape::Result<()> {
//!     let lookup = Cinescrape::builder()
//!         .search_url("https://movies.example/search?q={query}")
//!         .build()?;
//!     let controller = ConversationController::new(lookup, SessionConfig::default());
//!
//!     if let Some(reply) = controller.handle_message(ChatId(42), "Inception 2010").await {
//!         println!("{}", reply.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod lookup;
pub mod source;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use error::{CinescrapeError, FetchError, ParseError, Result};
pub use lookup::{Cinescrape, LookupBuilder, MovieLookup};

pub use cache::{CacheConfig, CacheEntry, EntryStatus, ResultCache};
pub use conversation::{ConversationController, SessionConfig, SessionState};
pub use extract::{Extractor, SelectorConfig, Strategy};
pub use source::{
    HttpConfig, HttpPageSource, PageSource, RateLimitConfig, RateLimiter, RetryConfig,
    RetryingPageSource, SearchUrlTemplate,
};
pub use types::{ChatId, MovieRecord, OutboundMessage, QueryKey, normalize};
