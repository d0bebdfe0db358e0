//! Supervisor-level test of stream mode: jobs read from a file feed the
//! queue, workers drain it, and `join` returns once the input and queue
//! are both exhausted, without needing a URL server at all.

use std::io::Write;
use std::time::Duration;

use tendril_core::Supervisor;
use tendril_types::{Identity, ResolvedConfig, WorkerConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn stream_mode_drains_file_and_stops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}/a", server.uri()).unwrap();
    writeln!(file, "{}/b", server.uri()).unwrap();

    let raw = WorkerConfig {
        stream_input: Some(file.path().to_string_lossy().into_owned()),
        input_is_plain: true,
        identity: Some(Identity {
            user_agent: "tendril-test/1.0".to_string(),
            name: "tendril-test".to_string(),
        }),
        max_connections: Some(2),
        ..Default::default()
    };
    let resolved = ResolvedConfig::from_config(&raw, None).unwrap();

    let supervisor = std::sync::Arc::new(Supervisor::new(resolved).unwrap());
    supervisor.start().await;

    tokio::time::timeout(Duration::from_secs(5), supervisor.join())
        .await
        .expect("supervisor should stop once stream input drains")
        .expect("run loop should not report an error");
}
