use hexwatch_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde_json::{Value, json};
use std::borrow::Cow;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::new(&format!("{}/", server.uri())).expect("mock base url")
}

#[tokio::test]
async fn query_auth_is_sent_with_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/items"))
        .and(query_param("token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let got: Value = client_for(&server)
        .get_json(
            "v2/items",
            RequestOpts {
                auth: Some(Auth::Query {
                    name: "token",
                    value: Cow::Borrowed(" abc "),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(got, json!({"ok": true}));
}

#[tokio::test]
async fn default_client_does_not_retry_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"message": "busy"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_json::<Value>("busy", RequestOpts::default())
        .await
        .unwrap_err();

    match err {
        HttpError::Api {
            status, message, ..
        } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(message, "busy");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
        .mount(&server)
        .await;

    let got: Vec<u32> = client_for(&server)
        .with_retries(1)
        .get_json("flaky", RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(got, vec![1, 2, 3]);
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_json::<Value>("html", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Decode(_, ref snippet) if snippet.contains("not json")));
    assert!(err.status().is_none());
}
