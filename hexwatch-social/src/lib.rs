//! Social feed clients and extractors used by hexwatch.
//!
//! Only the Twitter/X pipeline exists: a client for the hosted tweet scraper, the
//! wire types it returns, and the address extractor that runs over tweet text.
pub mod twitter;
