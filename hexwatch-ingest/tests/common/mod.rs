#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use hexwatch_ingest::Store;
use hexwatch_social::twitter::{FetchError, TweetRecord, TweetSource};
use hexwatch_http::HttpError;
use std::sync::Mutex;

pub const ADDR_A: &str = "0xAbC1230000000000000000000000000000000000";
pub const ADDR_B: &str = "0xdef4560000000000000000000000000000000001";

pub async fn migrated_store() -> Store {
    let store = Store::in_memory().await.expect("in-memory sqlite");
    store.migrate().await.expect("migrations apply");
    store
}

pub fn tweet(id: &str, content: &str) -> TweetRecord {
    TweetRecord {
        username: "alice".into(),
        tweet_id: id.into(),
        content: content.into(),
        timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        metadata: None,
    }
}

/// Hands out queued batches, one per fetch; an exhausted queue is a fetch error.
pub struct ScriptedSource {
    batches: Mutex<Vec<Result<Vec<TweetRecord>, FetchError>>>,
}

impl ScriptedSource {
    pub fn new(mut batches: Vec<Result<Vec<TweetRecord>, FetchError>>) -> Self {
        batches.reverse();
        Self {
            batches: Mutex::new(batches),
        }
    }
}

pub fn unreachable() -> FetchError {
    FetchError::Http(HttpError::Network("connection refused".into()))
}

#[async_trait::async_trait]
impl TweetSource for ScriptedSource {
    async fn fetch_tweets(&self) -> Result<Vec<TweetRecord>, FetchError> {
        self.batches
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(unreachable()))
    }
}
