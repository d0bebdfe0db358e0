use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tendril_queue::WorkQueue;
use tendril_types::{FeedMode, Job, QueueFetchError, ResolvedConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Pushes jobs into `queue` until the source is exhausted or `closed` is
/// set (`spec.md` §4.5, C5). Server-mode failures fetching the crawl
/// queue are the one class of per-iteration error that escalates
/// (`spec.md` §7): the worker cannot make progress without the queue
/// server, so it propagates up to the supervisor rather than retrying
/// forever silently.
pub async fn run(
    config: Arc<ResolvedConfig>,
    queue: Arc<WorkQueue>,
    client: reqwest::Client,
    closed: Arc<AtomicBool>,
) -> Result<(), QueueFetchError> {
    match &config.mode {
        FeedMode::Server { manager_url } => {
            run_server(manager_url, &config, &queue, &client, &closed).await
        }
        FeedMode::Stream { path, input_is_plain } => {
            run_stream(path, *input_is_plain, &queue, &closed).await;
            Ok(())
        }
    }
}

async fn run_server(
    manager_url: &str,
    config: &ResolvedConfig,
    queue: &Arc<WorkQueue>,
    client: &reqwest::Client,
    closed: &Arc<AtomicBool>,
) -> Result<(), QueueFetchError> {
    let endpoint = format!("{manager_url}/crawl-queue");

    while !closed.load(Ordering::SeqCst) {
        if queue.is_full() {
            tokio::time::sleep(config.full_queue_pause).await;
            continue;
        }

        let limit = queue.capacity().saturating_sub(queue.len());
        let response = client
            .post(&endpoint)
            .header("X-Heroshi-Auth", &config.api_key)
            .form(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| QueueFetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(QueueFetchError(format!(
                "crawl-queue endpoint returned status {}",
                response.status()
            )));
        }

        let batch: Vec<Job> = response
            .json()
            .await
            .map_err(|e| QueueFetchError(e.to_string()))?;

        if batch.is_empty() {
            tokio::time::sleep(config.empty_batch_backoff).await;
            continue;
        }

        debug!(count = batch.len(), "fetched crawl-queue batch");
        for job in batch {
            if !queue.put(job).await {
                break;
            }
        }
        queue.shuffle();
    }
    queue.close();
    Ok(())
}

async fn run_stream(path: &str, input_is_plain: bool, queue: &Arc<WorkQueue>, closed: &Arc<AtomicBool>) {
    let reader: Box<dyn tokio::io::AsyncRead + Unpin + Send> = if path == "-" {
        Box::new(tokio::io::stdin())
    } else {
        match tokio::fs::File::open(path).await {
            Ok(file) => Box::new(file),
            Err(e) => {
                tracing::error!(path, %e, "failed to open stream input");
                queue.close();
                return;
            }
        }
    };

    let mut lines = BufReader::new(reader).lines();
    loop {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(%e, "error reading stream input");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let job = if input_is_plain {
            Some(Job::new(line.to_string()))
        } else {
            serde_json::from_str::<Job>(line)
                .map_err(|e| tracing::warn!(%e, line, "skipping malformed stream-input line"))
                .ok()
        };

        if let Some(job) = job {
            if !queue.put(job).await {
                break;
            }
        }
    }
    info!("stream input exhausted");
    queue.close();
}
