//! Supervisor-level test of server mode: the feeder's crawl-queue request
//! and the reporter's report submission both follow the URL server's wire
//! contract (`POST /crawl-queue` with an urlencoded `limit=N` body -> a
//! top-level JSON array of jobs; `PUT /report` with one JSON report object
//! per job, not a batch).

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tendril_core::Supervisor;
use tendril_types::{Identity, ResolvedConfig, WorkerConfig};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn server_mode_polls_crawl_queue_and_submits_report() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/crawl-queue"))
        .and(body_string_contains("limit="))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"url": format!("{}/page", server.uri())}])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crawl-queue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let raw = WorkerConfig {
        manager_url: Some(server.uri()),
        identity: Some(Identity {
            user_agent: "tendril-test/1.0".to_string(),
            name: "tendril-test".to_string(),
        }),
        max_connections: Some(1),
        ..Default::default()
    };
    let resolved = ResolvedConfig::from_config(&raw, None).unwrap();

    let supervisor = Arc::new(Supervisor::new(resolved).unwrap());
    supervisor.start().await;

    // Give the feeder + one worker time to pull the job, fetch it, and
    // submit the report before we tear the run loop down.
    tokio::time::sleep(Duration::from_millis(300)).await;
    supervisor
        .graceful_stop(Duration::from_secs(5))
        .await
        .expect("graceful stop should succeed");
}
