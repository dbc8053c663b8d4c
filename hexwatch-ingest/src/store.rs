//! SQLite persistence for scraped tweets, the address cache, and scheduler audit rows.
//!
//! Writes are single statements without a surrounding transaction: a crash between
//! a tweet insert and its address upserts leaves the tweet without address rows, and
//! the next cycle does not repair that. The address upsert is one atomic
//! `INSERT ... ON CONFLICT DO UPDATE`, so concurrent cycles cannot race on it.
use crate::pipeline::CycleReport;
use chrono::{DateTime, Utc};
use hexwatch_common::TWITTER_SOURCE;
use hexwatch_social::twitter::{extract::is_address, TweetRecord};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("tweet {0} is already stored")]
    DuplicateTweet(String),
    #[error("not an address: {0}")]
    InvalidAddress(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedContentRow {
    pub tweet_id: String,
    pub username: String,
    pub content: String,
    pub addresses: Vec<String>,
    pub tweeted_at: DateTime<Utc>,
    pub metadata: Option<Value>,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressCacheRow {
    pub address: String,
    pub source: String,
    pub source_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerTaskState {
    pub task_name: String,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "succeeded" => RunStatus::Succeeded,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerRunRow {
    pub id: i64,
    pub task_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub report: CycleReport,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;
        info!(url=%url, max_connections, "store.connected");
        Ok(Self { pool })
    }

    /// A private in-memory database. Pinned to one connection that never idles out,
    /// since every SQLite connection to `:memory:` is a separate database.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("store.migrated");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert one scraped tweet with its extracted addresses.
    pub async fn store_tweet(
        &self,
        record: &TweetRecord,
        addresses: &BTreeSet<String>,
    ) -> Result<()> {
        let addresses_json = serde_json::to_string(addresses)?;
        let metadata_json = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let res = sqlx::query(
            r#"INSERT INTO twitter_scrape_data
               (tweet_id, username, content, addresses, tweeted_at, metadata, scraped_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        )
        .bind(record.tweet_id.as_str())
        .bind(record.username.as_str())
        .bind(record.content.as_str())
        .bind(addresses_json)
        .bind(record.timestamp)
        .bind(metadata_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PersistenceError::DuplicateTweet(record.tweet_id.clone())
            }
            other => PersistenceError::Database(other),
        })?;

        info!(
            tweet_id=%record.tweet_id,
            username=%record.username,
            addresses=addresses.len(),
            rows=res.rows_affected(),
            "store.store_tweet"
        );
        Ok(())
    }

    /// Record a sighting of `address` in tweet `tweet_id`, now.
    pub async fn upsert_address(&self, address: &str, tweet_id: &str) -> Result<()> {
        self.upsert_address_at(address, tweet_id, Utc::now()).await
    }

    /// Insert the address on first sighting; afterwards only `last_seen` moves.
    pub async fn upsert_address_at(
        &self,
        address: &str,
        tweet_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        if !is_address(address) {
            return Err(PersistenceError::InvalidAddress(address.to_string()));
        }
        let metadata = json!({ "first_seen_tweet": tweet_id }).to_string();

        let res = sqlx::query(
            r#"INSERT INTO address_cache
               (address, source, source_id, first_seen, last_seen, metadata)
               VALUES (?1, ?2, ?3, ?4, ?4, ?5)
               ON CONFLICT(address) DO UPDATE SET
                 last_seen = excluded.last_seen"#,
        )
        .bind(address)
        .bind(TWITTER_SOURCE)
        .bind(tweet_id)
        .bind(seen_at)
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        debug!(
            address=%address,
            tweet_id=%tweet_id,
            rows=res.rows_affected(),
            "store.upsert_address"
        );
        Ok(())
    }

    pub async fn get_tweet(&self, tweet_id: &str) -> Result<Option<ScrapedContentRow>> {
        let row = sqlx::query(
            r#"SELECT tweet_id, username, content, addresses, tweeted_at, metadata, scraped_at
               FROM twitter_scrape_data WHERE tweet_id = ?"#,
        )
        .bind(tweet_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| content_row(&r)).transpose()
    }

    pub async fn get_address(&self, address: &str) -> Result<Option<AddressCacheRow>> {
        let row = sqlx::query(
            r#"SELECT address, source, source_id, first_seen, last_seen, metadata
               FROM address_cache WHERE address = ?"#,
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| address_row(&r)).transpose()
    }

    /// Addresses seen since `since`, most recent first.
    pub async fn addresses_seen_since(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AddressCacheRow>> {
        let rows = sqlx::query(
            r#"SELECT address, source, source_id, first_seen, last_seen, metadata
               FROM address_cache
               WHERE last_seen >= ?
               ORDER BY last_seen DESC
               LIMIT ?"#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(address_row).collect()
    }

    pub async fn count_tweets(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM twitter_scrape_data")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn count_addresses(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM address_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Stamp `task_name` as having run at `at`. `updated_at` is kept by a trigger.
    pub async fn record_task_run(&self, task_name: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO scheduler_settings (task_name, last_run)
               VALUES (?1, ?2)
               ON CONFLICT(task_name) DO UPDATE SET
                 last_run = excluded.last_run"#,
        )
        .bind(task_name)
        .bind(at)
        .execute(&self.pool)
        .await?;
        debug!(task=%task_name, at=%at, "store.record_task_run");
        Ok(())
    }

    pub async fn task_state(&self, task_name: &str) -> Result<Option<SchedulerTaskState>> {
        let row = sqlx::query(
            r#"SELECT task_name, last_run, created_at, updated_at
               FROM scheduler_settings WHERE task_name = ?"#,
        )
        .bind(task_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => Some(SchedulerTaskState {
                task_name: r.try_get("task_name")?,
                last_run: r.try_get("last_run")?,
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
            }),
            None => None,
        })
    }

    /// Open an audit row for a cycle; returns its id.
    pub async fn start_run(&self, task_name: &str, started_at: DateTime<Utc>) -> Result<i64> {
        let res = sqlx::query(
            r#"INSERT INTO scheduler_runs (task_name, started_at, status)
               VALUES (?1, ?2, ?3)"#,
        )
        .bind(task_name)
        .bind(started_at)
        .bind(RunStatus::Running.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn finish_run(
        &self,
        run_id: i64,
        finished_at: DateTime<Utc>,
        status: RunStatus,
        report: &CycleReport,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE scheduler_runs SET
                 finished_at = ?2,
                 status = ?3,
                 tweets_fetched = ?4,
                 tweets_stored = ?5,
                 tweet_failures = ?6,
                 addresses_upserted = ?7,
                 address_failures = ?8,
                 error = ?9
               WHERE id = ?1"#,
        )
        .bind(run_id)
        .bind(finished_at)
        .bind(status.as_str())
        .bind(report.tweets_fetched as i64)
        .bind(report.tweets_stored as i64)
        .bind(report.tweet_failures as i64)
        .bind(report.addresses_upserted as i64)
        .bind(report.address_failures as i64)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Latest audit rows for `task_name`, newest first.
    pub async fn recent_runs(&self, task_name: &str, limit: i64) -> Result<Vec<SchedulerRunRow>> {
        let rows = sqlx::query(
            r#"SELECT id, task_name, started_at, finished_at, status,
                      tweets_fetched, tweets_stored, tweet_failures,
                      addresses_upserted, address_failures, error
               FROM scheduler_runs
               WHERE task_name = ?
               ORDER BY id DESC
               LIMIT ?"#,
        )
        .bind(task_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                let status: String = r.try_get("status")?;
                Ok(SchedulerRunRow {
                    id: r.try_get("id")?,
                    task_name: r.try_get("task_name")?,
                    started_at: r.try_get("started_at")?,
                    finished_at: r.try_get("finished_at")?,
                    status: RunStatus::parse(&status),
                    report: CycleReport {
                        tweets_fetched: count_col(r, "tweets_fetched")?,
                        tweets_stored: count_col(r, "tweets_stored")?,
                        tweet_failures: count_col(r, "tweet_failures")?,
                        addresses_upserted: count_col(r, "addresses_upserted")?,
                        address_failures: count_col(r, "address_failures")?,
                    },
                    error: r.try_get("error")?,
                })
            })
            .collect()
    }
}

fn count_col(r: &SqliteRow, col: &str) -> Result<usize> {
    let n: i64 = r.try_get(col)?;
    Ok(usize::try_from(n).unwrap_or_default())
}

fn content_row(r: &SqliteRow) -> Result<ScrapedContentRow> {
    let addresses: String = r.try_get("addresses")?;
    let metadata: Option<String> = r.try_get("metadata")?;
    Ok(ScrapedContentRow {
        tweet_id: r.try_get("tweet_id")?,
        username: r.try_get("username")?,
        content: r.try_get("content")?,
        addresses: serde_json::from_str(&addresses)?,
        tweeted_at: r.try_get("tweeted_at")?,
        metadata: metadata.as_deref().map(serde_json::from_str).transpose()?,
        scraped_at: r.try_get("scraped_at")?,
    })
}

fn address_row(r: &SqliteRow) -> Result<AddressCacheRow> {
    let metadata: String = r.try_get("metadata")?;
    Ok(AddressCacheRow {
        address: r.try_get("address")?,
        source: r.try_get("source")?,
        source_id: r.try_get("source_id")?,
        first_seen: r.try_get("first_seen")?,
        last_seen: r.try_get("last_seen")?,
        metadata: serde_json::from_str(&metadata)?,
    })
}
