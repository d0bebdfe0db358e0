use std::time::Duration;

use tendril_net::{FetchOutcome, Fetcher};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetch_returns_body_and_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new("tendril-test/1.0", 5, Duration::from_secs(120));
    let url = Url::parse(&format!("{}/ok", server.uri())).unwrap();

    let outcome = fetcher.fetch(&url, Duration::from_secs(5)).await.unwrap();
    match outcome {
        FetchOutcome::Success { status_code, body, .. } => {
            assert_eq!(status_code, 200);
            assert_eq!(body, b"hello");
        }
        FetchOutcome::Timeout => panic!("expected success"),
    }
}

#[tokio::test]
async fn fetch_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new("tendril-test/1.0", 5, Duration::from_secs(120));
    let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();

    let outcome = fetcher.fetch(&url, Duration::from_millis(100)).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Timeout));
}

#[tokio::test]
async fn repeated_fetches_to_same_host_reuse_pooled_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new("tendril-test/1.0", 1, Duration::from_secs(120));
    let a = Url::parse(&format!("{}/a", server.uri())).unwrap();
    let b = Url::parse(&format!("{}/b", server.uri())).unwrap();

    assert!(matches!(
        fetcher.fetch(&a, Duration::from_secs(5)).await.unwrap(),
        FetchOutcome::Success { status_code: 200, .. }
    ));
    assert!(matches!(
        fetcher.fetch(&b, Duration::from_secs(5)).await.unwrap(),
        FetchOutcome::Success { status_code: 200, .. }
    ));
}
