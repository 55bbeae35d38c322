//! Public types for the Cinescrape API.

mod message;
mod query;
mod record;

pub use message::{ChatId, OutboundMessage};
pub use query::{QueryKey, normalize};
pub use record::{MovieRecord, RATING_RANGE, YEAR_RANGE};
