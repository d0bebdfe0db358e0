use tendril_types::{Report, ReportError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

/// Submits completed `Report`s to the URL server's `/report` endpoint
/// (`spec.md` §4.7, C7), one `PUT` per report, matching the original's
/// `report_result` call (there is no batching to the wire contract; only
/// the send is decoupled from the pipeline worker via a channel). Report
/// failures are logged and dropped, never escalated (`spec.md` §7) — a
/// lost report only delays the URL server's view of that job, it doesn't
/// corrupt worker state.
#[derive(Clone)]
pub struct Reporter {
    tx: mpsc::Sender<Report>,
}

impl Reporter {
    /// Spawns the background send loop and returns a handle to submit
    /// reports to it. `report_content` controls whether `Report::content`
    /// is serialized at all, independent of the per-job UTF-8 fallback.
    pub fn spawn(
        client: reqwest::Client,
        manager_url: String,
        api_key: String,
        report_content: bool,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(send_loop(client, manager_url, api_key, report_content, rx));
        Self { tx }
    }

    /// Queue `report` for the send loop. Never blocks indefinitely: the
    /// channel is large enough relative to `max_connections` that this
    /// only applies backpressure, it doesn't deadlock the pipeline.
    pub async fn submit(&self, report: Report) {
        if self.tx.send(report).await.is_err() {
            warn!("reporter send loop has exited, dropping report");
        }
    }
}

async fn send_loop(
    client: reqwest::Client,
    manager_url: String,
    api_key: String,
    report_content: bool,
    mut rx: mpsc::Receiver<Report>,
) {
    let endpoint = format!("{manager_url}/report");
    while let Some(report) = rx.recv().await {
        if let Err(e) = send_one(&client, &endpoint, &api_key, report_content, report).await {
            warn!(%e, "dropping report after send failure");
        }
    }
}

async fn send_one(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    report_content: bool,
    report: Report,
) -> Result<(), ReportError> {
    let value = match report.to_json(report_content) {
        Ok(value) => value,
        Err(_) => report
            .without_content()
            .to_json(false)
            .expect("report without content always serializes"),
    };

    debug!(%endpoint, "submitting report");
    let response = client
        .put(endpoint)
        .header("X-Heroshi-Auth", api_key)
        .json(&value)
        .send()
        .await
        .map_err(|e| ReportError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ReportError(format!(
            "report endpoint returned status {}",
            response.status()
        )));
    }
    Ok(())
}
