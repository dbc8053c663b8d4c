mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{ADDR_A, ADDR_B, migrated_store, tweet};
use hexwatch_ingest::store::RunStatus;
use hexwatch_ingest::{CycleReport, PersistenceError};
use serde_json::json;
use std::collections::BTreeSet;

#[tokio::test]
async fn stores_tweet_with_addresses_and_metadata() {
    let store = migrated_store().await;
    let mut record = tweet("100", &format!("{ADDR_B} then {ADDR_A}"));
    record.metadata = Some(json!({ "likes": 7 }));
    let addresses: BTreeSet<String> = [ADDR_B, ADDR_A].into_iter().map(String::from).collect();

    store.store_tweet(&record, &addresses).await.unwrap();

    let row = store.get_tweet("100").await.unwrap().expect("row exists");
    assert_eq!(row.username, "alice");
    assert_eq!(row.content, record.content);
    assert_eq!(row.addresses, vec![ADDR_A.to_string(), ADDR_B.to_string()]);
    assert_eq!(row.tweeted_at, record.timestamp);
    assert_eq!(row.metadata, Some(json!({ "likes": 7 })));
    assert!(store.get_tweet("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_tweet_id_is_reported() {
    let store = migrated_store().await;
    let record = tweet("200", "gm");
    store.store_tweet(&record, &BTreeSet::new()).await.unwrap();

    let err = store
        .store_tweet(&record, &BTreeSet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::DuplicateTweet(ref id) if id == "200"));
    assert_eq!(store.count_tweets().await.unwrap(), 1);
}

#[tokio::test]
async fn repeat_sighting_only_moves_last_seen() {
    let store = migrated_store().await;
    let first = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
    let second = first + Duration::hours(2);

    store.upsert_address_at(ADDR_A, "t1", first).await.unwrap();
    store.upsert_address_at(ADDR_A, "t2", second).await.unwrap();

    assert_eq!(store.count_addresses().await.unwrap(), 1);
    let row = store.get_address(ADDR_A).await.unwrap().expect("cached");
    assert_eq!(row.source, "twitter");
    assert_eq!(row.source_id, "t1");
    assert_eq!(row.metadata, json!({ "first_seen_tweet": "t1" }));
    assert_eq!(row.first_seen, first);
    assert_eq!(row.last_seen, second);
}

#[tokio::test]
async fn upsert_with_wall_clock_advances_last_seen() {
    let store = migrated_store().await;
    store.upsert_address(ADDR_B, "t1").await.unwrap();
    let before = store.get_address(ADDR_B).await.unwrap().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.upsert_address(ADDR_B, "t2").await.unwrap();
    let after = store.get_address(ADDR_B).await.unwrap().unwrap();

    assert!(after.last_seen > before.last_seen);
    assert_eq!(after.first_seen, before.first_seen);
    assert_eq!(after.source_id, "t1");
}

#[tokio::test]
async fn malformed_address_is_rejected() {
    let store = migrated_store().await;
    let err = store.upsert_address("0x1234", "t1").await.unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidAddress(_)));
    assert_eq!(store.count_addresses().await.unwrap(), 0);
}

#[tokio::test]
async fn addresses_seen_since_filters_and_orders() {
    let store = migrated_store().await;
    let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    store.upsert_address_at(ADDR_A, "t1", t0).await.unwrap();
    store
        .upsert_address_at(ADDR_B, "t2", t0 + Duration::hours(3))
        .await
        .unwrap();

    let recent = store
        .addresses_seen_since(t0 + Duration::hours(1), 10)
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].address, ADDR_B);

    let all = store.addresses_seen_since(t0, 10).await.unwrap();
    let order: Vec<_> = all.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(order, vec![ADDR_B, ADDR_A]);
}

#[tokio::test]
async fn task_state_is_upserted_and_trigger_touches_updated_at() {
    let store = migrated_store().await;
    let first = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    store.record_task_run("twitter_scrape", first).await.unwrap();

    // Backdate updated_at so the trigger's refresh is observable.
    sqlx::query("UPDATE scheduler_settings SET updated_at = '2000-01-01T00:00:00Z'")
        .execute(store.pool())
        .await
        .unwrap();

    let second = first + Duration::hours(2);
    store.record_task_run("twitter_scrape", second).await.unwrap();

    let state = store
        .task_state("twitter_scrape")
        .await
        .unwrap()
        .expect("task row");
    assert_eq!(state.last_run, Some(second));
    assert!(state.updated_at > Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    assert!(store.task_state("other").await.unwrap().is_none());
}

#[tokio::test]
async fn run_audit_rows_round_trip() {
    let store = migrated_store().await;
    let started = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let id = store.start_run("twitter_scrape", started).await.unwrap();

    let runs = store.recent_runs("twitter_scrape", 5).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Running);
    assert!(runs[0].finished_at.is_none());

    let report = CycleReport {
        tweets_fetched: 3,
        tweets_stored: 2,
        tweet_failures: 1,
        addresses_upserted: 4,
        address_failures: 0,
    };
    store
        .finish_run(id, started + Duration::seconds(9), RunStatus::Succeeded, &report, None)
        .await
        .unwrap();

    let runs = store.recent_runs("twitter_scrape", 5).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, id);
    assert_eq!(runs[0].status, RunStatus::Succeeded);
    assert_eq!(runs[0].report, report);
    assert_eq!(runs[0].finished_at, Some(started + Duration::seconds(9)));
    assert!(runs[0].error.is_none());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let store = migrated_store().await;
    store.migrate().await.unwrap();
    assert_eq!(store.count_tweets().await.unwrap(), 0);
}
