use hexwatch_social::twitter::{FetchError, TweetSource, TwitterScraper, extract_addresses};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACTOR: &str = "acme~tweet-scraper";
const DATASET_PATH: &str = "/v2/acts/acme~tweet-scraper/run-sync-get-dataset-items";

fn scraper_for(server: &MockServer) -> TwitterScraper {
    TwitterScraper::new(&format!("{}/v2", server.uri()), ACTOR, "test-token")
        .unwrap()
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn fetches_and_decodes_tweets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATASET_PATH))
        .and(query_param("token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "username": "alice",
                "tweet_id": "1",
                "content": "new deploy 0x52908400098527886E0F7030069857D2E4169EE7",
                "timestamp": "2025-03-01T12:00:00Z",
                "metadata": { "likes": 10 }
            },
            {
                "username": "bob",
                "tweet_id": 2,
                "content": "gm",
                "timestamp": "2025-03-01T12:05:00Z"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tweets = scraper_for(&server).fetch_tweets().await.unwrap();
    assert_eq!(tweets.len(), 2);
    assert_eq!(tweets[0].username, "alice");
    assert_eq!(extract_addresses(&tweets[0].content).len(), 1);
    assert_eq!(tweets[1].tweet_id, "2");
    assert!(tweets[1].metadata.is_none());
}

#[tokio::test]
async fn empty_dataset_is_an_empty_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATASET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let source: Box<dyn TweetSource> = Box::new(scraper_for(&server));
    assert!(source.fetch_tweets().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_success_status_is_a_fetch_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATASET_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "type": "run-failed", "message": "actor crashed" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = scraper_for(&server).fetch_tweets().await.unwrap_err();
    match err {
        FetchError::Http(http) => {
            assert_eq!(http.status().map(|s| s.as_u16()), Some(500));
            assert!(http.to_string().contains("actor crashed"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_fetch_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let scraper = TwitterScraper::new(&uri, ACTOR, "t")
        .unwrap()
        .with_timeout(Duration::from_secs(2));
    let err = scraper.fetch_tweets().await.unwrap_err();
    assert!(matches!(err, FetchError::Http(_)));
    assert!(!err.to_string().contains("token=t"));
}
