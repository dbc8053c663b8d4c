//! One scrape -> extract -> write cycle.
//!
//! Tweets and their addresses are handled one at a time, in the order the scraper
//! returned them. Per-tweet and per-address write failures are logged and counted;
//! only a failed fetch ends the cycle early.
use crate::store::{PersistenceError, RunStatus, Store};
use chrono::Utc;
use hexwatch_social::twitter::{extract_addresses, FetchError, TweetRecord, TweetSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Counters for one cycle. Also persisted in `scheduler_runs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub tweets_fetched: usize,
    pub tweets_stored: usize,
    pub tweet_failures: usize,
    pub addresses_upserted: usize,
    pub address_failures: usize,
}

#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn TweetSource>,
    store: Store,
    task_name: String,
}

impl Pipeline {
    pub fn new(source: Arc<dyn TweetSource>, store: Store, task_name: impl Into<String>) -> Self {
        Self {
            source,
            store,
            task_name: task_name.into(),
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, PipelineError> {
        let started_at = Utc::now();
        info!(task=%self.task_name, "pipeline.cycle.start");

        // The audit row is best effort; a store outage must not stop the cycle.
        let run_id = match self.store.start_run(&self.task_name, started_at).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(task=%self.task_name, error=%err, "pipeline.audit.start_failed");
                None
            }
        };

        let tweets = match self.source.fetch_tweets().await {
            Ok(tweets) => tweets,
            Err(err) => {
                error!(task=%self.task_name, error=%err, "pipeline.cycle.fetch_failed");
                let msg = err.to_string();
                self.finish_audit(run_id, RunStatus::Failed, &CycleReport::default(), Some(&msg))
                    .await;
                return Err(err.into());
            }
        };

        let mut report = CycleReport {
            tweets_fetched: tweets.len(),
            ..CycleReport::default()
        };
        for tweet in &tweets {
            self.process_tweet(tweet, &mut report).await;
        }

        self.finish_audit(run_id, RunStatus::Succeeded, &report, None)
            .await;
        if let Err(err) = self.store.record_task_run(&self.task_name, Utc::now()).await {
            warn!(task=%self.task_name, error=%err, "pipeline.audit.task_state_failed");
        }

        info!(
            task=%self.task_name,
            fetched=report.tweets_fetched,
            stored=report.tweets_stored,
            tweet_failures=report.tweet_failures,
            addresses=report.addresses_upserted,
            address_failures=report.address_failures,
            elapsed_ms=(Utc::now() - started_at).num_milliseconds(),
            "pipeline.cycle.done"
        );
        Ok(report)
    }

    async fn process_tweet(&self, tweet: &TweetRecord, report: &mut CycleReport) {
        let addresses = extract_addresses(&tweet.content);

        match self.store.store_tweet(tweet, &addresses).await {
            Ok(()) => report.tweets_stored += 1,
            Err(PersistenceError::DuplicateTweet(id)) => {
                // Re-scraped tweet; its addresses still get their sighting refreshed.
                report.tweet_failures += 1;
                info!(tweet_id=%id, "pipeline.tweet.duplicate");
            }
            Err(err) => {
                report.tweet_failures += 1;
                warn!(tweet_id=%tweet.tweet_id, error=%err, "pipeline.tweet.store_failed");
            }
        }

        for address in &addresses {
            match self.store.upsert_address(address, &tweet.tweet_id).await {
                Ok(()) => report.addresses_upserted += 1,
                Err(err) => {
                    report.address_failures += 1;
                    warn!(
                        address=%address,
                        tweet_id=%tweet.tweet_id,
                        error=%err,
                        "pipeline.address.upsert_failed"
                    );
                }
            }
        }
    }

    async fn finish_audit(
        &self,
        run_id: Option<i64>,
        status: RunStatus,
        report: &CycleReport,
        error: Option<&str>,
    ) {
        let Some(run_id) = run_id else {
            return;
        };
        if let Err(err) = self
            .store
            .finish_run(run_id, Utc::now(), status, report, error)
            .await
        {
            warn!(task=%self.task_name, run_id, error=%err, "pipeline.audit.finish_failed");
        }
    }
}
