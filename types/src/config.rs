use serde::Deserialize;

/// Worker configuration as loaded from TOML (`SPEC_FULL.md` §4.9).
///
/// Every field here is intentionally optional or string-typed so that
/// loading never fails on a merely-incomplete file; `ResolvedConfig`
/// (in `resolved.rs`) is where defaults are applied and cross-field
/// invariants are enforced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerConfig {
    /// Base URL of the URL server. Required in server mode.
    pub manager_url: Option<String>,

    /// Token sent as `X-Heroshi-Auth`. May also come from `WORKER_API_KEY`.
    pub api_key: Option<String>,

    pub identity: Option<Identity>,

    /// Per-fetch wall-clock seconds. Default: 20.
    pub socket_timeout: Option<u64>,

    /// Seconds slept when the queue is full (server mode). Default: 30.
    pub full_queue_pause: Option<u64>,

    /// Worker-pool size. Default: 10.
    pub max_connections: Option<usize>,

    /// Queue capacity (server mode). Default: 1024.
    pub queue_size: Option<usize>,

    /// Path to read jobs from in stream mode, or `"-"` for stdin. Required
    /// in stream mode; mutually exclusive with `manager_url`.
    pub stream_input: Option<String>,

    /// Whether stream-mode input lines are bare URLs rather than JSON
    /// objects (`input_is_plain` in `spec.md` §4.5).
    #[serde(default)]
    pub input_is_plain: bool,

    /// `tracing` env-filter directive. Default: "info".
    pub log_level: Option<String>,

    /// Whether `Report::content` is populated. Default: true
    /// (`SPEC_FULL.md` §9, Open Question resolution).
    pub report_content: Option<bool>,

    /// robots.txt cache entry TTL, seconds. Default: 600.
    pub robots_cache_ttl: Option<u64>,

    /// Per-host HTTP connection pool size. Default: 5.
    pub host_pool_size: Option<usize>,

    /// Per-host idle connection timeout, seconds. Default: 120.
    pub host_pool_idle_timeout: Option<u64>,
}

/// Crawler identity: UA header value and robots.txt agent token.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub user_agent: String,
    pub name: String,
}
