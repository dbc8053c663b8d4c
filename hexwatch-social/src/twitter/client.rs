//! Client for the hosted tweet scraper.
//!
//! One call is one synchronous scraper run: `GET acts/<actor>/run-sync-get-dataset-items`
//! with the credential in the `token` query parameter. The scraper returns the run's
//! dataset as a JSON array of tweets. No pagination, and no retries at this layer:
//! a failed fetch surfaces to the scheduler, whose next tick is the retry.
use crate::twitter::source::TweetSource;
use crate::twitter::types::TweetRecord;
use hexwatch_http::{Auth, HttpClient, HttpError, RequestOpts};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("scraper credential is missing or empty")]
    MissingCredential,
    #[error("scraper actor id is empty")]
    MissingActor,
    #[error("scraper request failed: {0}")]
    Http(#[from] HttpError),
}

#[derive(Clone)]
pub struct TwitterScraper {
    http: HttpClient,
    token: String,
    actor_id: String,
    timeout: Duration,
}

// Never print the credential.
impl fmt::Debug for TwitterScraper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterScraper")
            .field("base", &self.http.base().as_str())
            .field("actor_id", &self.actor_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TwitterScraper {
    /// Build a scraper client. Fails when the credential or actor id is blank, so a
    /// misconfigured process dies at startup instead of on the first tick.
    ///
    /// ```
    /// use hexwatch_social::twitter::{FetchError, TwitterScraper};
    ///
    /// let err = TwitterScraper::new("https://api.apify.com/v2/", "acme~scraper", "  ")
    ///     .unwrap_err();
    /// assert!(matches!(err, FetchError::MissingCredential));
    /// ```
    pub fn new(base_url: &str, actor_id: &str, token: &str) -> Result<Self, FetchError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(FetchError::MissingCredential);
        }
        let actor_id = actor_id.trim();
        if actor_id.is_empty() {
            return Err(FetchError::MissingActor);
        }
        // Url::join drops the last path segment unless the base ends with '/'.
        let base = if base_url.ends_with('/') {
            Cow::Borrowed(base_url)
        } else {
            Cow::Owned(format!("{base_url}/"))
        };
        let http = HttpClient::new(&base)?;
        Ok(Self {
            http,
            token: token.to_string(),
            actor_id: actor_id.to_string(),
            timeout: Duration::from_secs(300),
        })
    }

    /// Scraper runs are synchronous on the server side, so this is usually minutes.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn dataset_path(&self) -> String {
        format!("acts/{}/run-sync-get-dataset-items", self.actor_id)
    }

    pub async fn fetch_tweets(&self) -> Result<Vec<TweetRecord>, FetchError> {
        let path = self.dataset_path();
        tracing::info!(actor_id=%self.actor_id, "scraper.fetch.start");

        let tweets: Vec<TweetRecord> = self
            .http
            .get_json(
                &path,
                RequestOpts {
                    auth: Some(Auth::Query {
                        name: "token",
                        value: Cow::Borrowed(&self.token),
                    }),
                    timeout: Some(self.timeout),
                    ..Default::default()
                },
            )
            .await
            .inspect_err(|err| {
                tracing::warn!(actor_id=%self.actor_id, error=%err, "scraper.fetch.failed");
            })?;

        tracing::info!(
            actor_id=%self.actor_id,
            tweets=tweets.len(),
            "scraper.fetch.done"
        );
        Ok(tweets)
    }
}

#[async_trait::async_trait]
impl TweetSource for TwitterScraper {
    async fn fetch_tweets(&self) -> Result<Vec<TweetRecord>, FetchError> {
        TwitterScraper::fetch_tweets(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_path_uses_actor_id() {
        let scraper = TwitterScraper::new("https://api.apify.com/v2", "acme~tweets", "t").unwrap();
        assert_eq!(
            scraper.dataset_path(),
            "acts/acme~tweets/run-sync-get-dataset-items"
        );
    }

    #[test]
    fn base_without_trailing_slash_keeps_its_path() {
        let scraper = TwitterScraper::new("https://api.apify.com/v2", "a", "t").unwrap();
        let joined = scraper.http.base().join(&scraper.dataset_path()).unwrap();
        assert_eq!(
            joined.as_str(),
            "https://api.apify.com/v2/acts/a/run-sync-get-dataset-items"
        );
    }

    #[test]
    fn debug_hides_token() {
        let scraper = TwitterScraper::new("https://api.apify.com/v2/", "a", "hunter2").unwrap();
        assert!(!format!("{scraper:?}").contains("hunter2"));
    }

    #[test]
    fn blank_actor_is_rejected() {
        let err = TwitterScraper::new("https://api.apify.com/v2/", " ", "t").unwrap_err();
        assert!(matches!(err, FetchError::MissingActor));
    }
}
