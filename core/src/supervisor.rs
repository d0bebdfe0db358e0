use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tendril_net::{Fetcher, RobotsCache};
use tendril_queue::WorkQueue;
use tendril_types::{FeedMode, ResolvedConfig, WorkerError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::feeder;
use crate::pipeline::process_job;
use crate::reporter::Reporter;

/// Point-in-time counters exposed in lieu of a `/healthz` endpoint
/// (`SPEC_FULL.md` §6: this worker has no inbound HTTP surface of its
/// own, so health is observed in-process rather than polled over HTTP).
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub queue_len: usize,
    pub queue_capacity: usize,
}

/// Owns the queue, fetcher, robots cache, and worker pool, and runs the
/// feeder + pipeline workers to completion (`spec.md` §4.8, C8).
///
/// Failure propagation is fail-stop: if the feeder's crawl-queue fetch
/// fails, or any pipeline worker task panics, every other task is
/// aborted and `run` returns the triggering error. A worker observing a
/// per-job failure never triggers this — it reports the failure and
/// moves on (`spec.md` §7).
pub struct Supervisor {
    config: Arc<ResolvedConfig>,
    queue: Arc<WorkQueue>,
    fetcher: Arc<Fetcher>,
    robots_cache: Arc<RobotsCache>,
    client: reqwest::Client,
    closed: Arc<AtomicBool>,
    handle: AsyncMutex<Option<tokio::task::JoinHandle<Result<(), WorkerError>>>>,
}

impl Supervisor {
    pub fn new(config: ResolvedConfig) -> Result<Self, WorkerError> {
        let client = reqwest::Client::builder()
            .user_agent(config.identity.user_agent.clone())
            .build()
            .map_err(|e| WorkerError::Config(e.to_string()))?;

        let fetcher = Fetcher::new(
            config.identity.user_agent.clone(),
            config.host_pool_size,
            config.host_pool_idle_timeout,
        );

        Ok(Self {
            queue: Arc::new(WorkQueue::new(config.queue_size)),
            fetcher: Arc::new(fetcher),
            robots_cache: Arc::new(RobotsCache::new(config.robots_cache_ttl)),
            client,
            closed: Arc::new(AtomicBool::new(false)),
            config: Arc::new(config),
            handle: AsyncMutex::new(None),
        })
    }

    pub fn stats(&self) -> Stats {
        Stats {
            queue_len: self.queue.len(),
            queue_capacity: self.queue.capacity(),
        }
    }

    /// Spawn the feeder and `max_connections` pipeline workers as a single
    /// background task and return immediately. Await `join` (or
    /// `graceful_stop`) to observe the result.
    pub async fn start(&self) {
        let join_handle = tokio::spawn(run_inner(
            self.config.clone(),
            self.queue.clone(),
            self.fetcher.clone(),
            self.robots_cache.clone(),
            self.client.clone(),
            self.closed.clone(),
        ));
        let mut handle = self.handle.lock().await;
        *handle = Some(join_handle);
    }

    /// Signal every task to wind down without waiting for completion.
    pub fn stop(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.queue.close();
    }

    /// Request shutdown and wait up to `timeout` for the run loop to
    /// finish draining in-flight jobs, then abort whatever remains.
    pub async fn graceful_stop(&self, timeout: Duration) -> Result<(), WorkerError> {
        self.stop();
        let mut handle = self.handle.lock().await;
        let Some(join_handle) = handle.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, join_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(WorkerError::Config(format!("run task panicked: {join_error}"))),
            Err(_) => {
                warn!("graceful stop timed out, jobs in flight were abandoned");
                Ok(())
            }
        }
    }

    /// Wait for the run loop to exit on its own (typically only in
    /// stream mode, once the input is exhausted and the queue drains).
    pub async fn join(&self) -> Result<(), WorkerError> {
        let mut handle = self.handle.lock().await;
        let Some(join_handle) = handle.take() else {
            return Ok(());
        };
        match join_handle.await {
            Ok(result) => result,
            Err(join_error) => Err(WorkerError::Config(format!("run task panicked: {join_error}"))),
        }
    }
}

async fn run_inner(
    config: Arc<ResolvedConfig>,
    queue: Arc<WorkQueue>,
    fetcher: Arc<Fetcher>,
    robots_cache: Arc<RobotsCache>,
    client: reqwest::Client,
    closed: Arc<AtomicBool>,
) -> Result<(), WorkerError> {
    let reporter = match &config.mode {
        FeedMode::Server { manager_url } => Some(Reporter::spawn(
            client.clone(),
            manager_url.clone(),
            config.api_key.clone(),
            config.report_content,
        )),
        FeedMode::Stream { .. } => None,
    };

    let mut tasks: JoinSet<Result<(), WorkerError>> = JoinSet::new();

    {
        let config = config.clone();
        let queue = queue.clone();
        let closed = closed.clone();
        tasks.spawn(async move { feeder::run(config, queue, client, closed).await.map_err(WorkerError::from) });
    }

    for _ in 0..config.max_connections {
        tasks.spawn(worker_loop(
            config.clone(),
            queue.clone(),
            fetcher.clone(),
            robots_cache.clone(),
            reporter.clone(),
        ));
    }

    let outcome = tasks.join_next().await;

    closed.store(true, Ordering::SeqCst);
    queue.close();
    tasks.shutdown().await;

    match outcome {
        None => Ok(()),
        Some(Ok(result)) => result,
        Some(Err(join_error)) => {
            error!(%join_error, "worker task panicked, stopping supervisor");
            Err(WorkerError::Config(format!("worker task panicked: {join_error}")))
        }
    }
}

async fn worker_loop(
    config: Arc<ResolvedConfig>,
    queue: Arc<WorkQueue>,
    fetcher: Arc<Fetcher>,
    robots_cache: Arc<RobotsCache>,
    reporter: Option<Reporter>,
) -> Result<(), WorkerError> {
    while let Some(job) = queue.get().await {
        let report = process_job(job, &config, &fetcher, &robots_cache).await;
        if let Some(reporter) = &reporter {
            reporter.submit(report).await;
        } else {
            info!(url = %report.url, result = ?report.result, "crawl result (stream mode, no reporter)");
        }
    }
    Ok(())
}
