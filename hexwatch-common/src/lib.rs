//! Shared pieces for the hexwatch crates.
//!
//! Holds the logging initialiser ([`observability`]) and the handful of labels that
//! both the scraper client and the store need to agree on. Kept dependency-light so
//! every crate in the workspace can pull it in.
//!
//! ```rust
//! use hexwatch_common::{DEFAULT_TASK_NAME, TWITTER_SOURCE};
//!
//! assert_eq!(TWITTER_SOURCE, "twitter");
//! assert_eq!(DEFAULT_TASK_NAME, "twitter_scrape");
//! ```

pub mod observability;

/// Source label written into `address_cache.source` for addresses first seen in a tweet.
pub const TWITTER_SOURCE: &str = "twitter";

/// Task name recorded in `scheduler_settings` / `scheduler_runs` for the tweet pipeline.
pub const DEFAULT_TASK_NAME: &str = "twitter_scrape";
