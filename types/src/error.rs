use thiserror::Error;

/// Fixed-string per-job failure reasons (`spec.md` §7). These map directly
/// onto `Report::result` and must match the literal strings the spec
/// prescribes — they are part of the wire contract with the URL server's
/// report consumers, not free-form diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    InvalidUri,
    MalformedQuoting,
    RobotsDenied,
    FetchTimeout,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::InvalidUri => "Invalid URI",
            FailureReason::MalformedQuoting => "Malformed URL quoting",
            FailureReason::RobotsDenied => "Deny by robots.txt",
            FailureReason::FetchTimeout => "Fetch timeout",
        };
        f.write_str(s)
    }
}

/// Errors from a `PoolMap::get` acquisition (C2).
#[derive(Debug, Error, Clone)]
pub enum PoolError {
    #[error("pool saturated for key '{key}', timed out after {timeout_secs}s")]
    Timeout { key: String, timeout_secs: u64 },
    #[error("resource factory failed for key '{key}': {message}")]
    Factory { key: String, message: String },
}

/// Errors from the robots.txt acquire-and-check protocol (C3).
///
/// `Fetch` corresponds to `spec.md`'s `FetchError` (transport failure
/// fetching robots.txt itself); `Parser` corresponds to `RobotsError`
/// (predicate exceptions / malformed quoting pathologies). Both propagate
/// to the pipeline as `Report::result`; neither is cached (`spec.md` §4.3
/// step 4).
#[derive(Debug, Error, Clone)]
pub enum RobotsCheckError {
    #[error("robots.txt fetch failed: {0}")]
    Fetch(String),
    #[error("robots.txt check failed: {0}")]
    Parser(String),
}

impl From<PoolError> for RobotsCheckError {
    fn from(err: PoolError) -> Self {
        RobotsCheckError::Fetch(err.to_string())
    }
}

/// Transport-level fetch failure (C1), distinct from `Timeout`/`Cancelled`
/// which are sentinels rather than errors.
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct FetchError(pub String);

/// `URLServer.get_crawl_queue` failure. Per `spec.md` §7, this escalates to
/// supervisor `stop()` rather than being folded into a per-job report.
#[derive(Debug, Error, Clone)]
#[error("crawl-queue request failed: {0}")]
pub struct QueueFetchError(pub String);

/// `URLServer.report` failure. Per `spec.md` §4.7/§7, this is logged and
/// dropped, never escalated.
#[derive(Debug, Error, Clone)]
#[error("report request failed: {0}")]
pub struct ReportError(pub String);

/// Fatal, process-level errors: bad configuration or an escalated
/// queue-fetch failure that leaves the worker unable to make progress.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    QueueFetch(#[from] QueueFetchError),
    #[error("stream input error: {0}")]
    Stream(#[from] std::io::Error),
}
