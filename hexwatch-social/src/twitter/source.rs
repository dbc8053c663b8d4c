use crate::twitter::client::FetchError;
use crate::twitter::types::TweetRecord;

/// Anything that can produce one batch of tweets per cycle.
///
/// The hosted scraper is the production implementation; tests drive the pipeline
/// with canned batches.
#[async_trait::async_trait]
pub trait TweetSource: Send + Sync {
    async fn fetch_tweets(&self) -> Result<Vec<TweetRecord>, FetchError>;
}
