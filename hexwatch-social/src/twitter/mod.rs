//! Twitter/X ingestion surface.
//!
//! `client` talks to the hosted scraper, `types` holds the records it returns,
//! `extract` pulls address-like substrings out of tweet text, and `source` is the
//! seam the ingest pipeline depends on.
pub mod client;
pub mod extract;
pub mod source;
pub mod types;

pub use client::{FetchError, TwitterScraper};
pub use extract::extract_addresses;
pub use source::TweetSource;
pub use types::TweetRecord;
