use std::time::Duration;

use crate::config::{Identity, WorkerConfig};
use crate::error::WorkerError;

const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 20;
const DEFAULT_FULL_QUEUE_PAUSE_SECS: u64 = 30;
const DEFAULT_MAX_CONNECTIONS: usize = 10;
const DEFAULT_QUEUE_SIZE: usize = 1024;
const DEFAULT_ROBOTS_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_HOST_POOL_SIZE: usize = 5;
const DEFAULT_HOST_POOL_IDLE_TIMEOUT_SECS: u64 = 120;
const EMPTY_BATCH_BACKOFF_SECS: u64 = 10;

/// How the Feeder (C5) sources jobs.
#[derive(Debug, Clone)]
pub enum FeedMode {
    /// Pull batches from the URL server's `/crawl-queue`.
    Server { manager_url: String },
    /// Read one job per line from a path, or stdin if the path is `-`.
    Stream { path: String, input_is_plain: bool },
}

/// Boundary-to-core configuration conversion (Invariant-First Architecture,
/// mirroring `forge_webfetch::resolved::ResolvedConfig`): every optional
/// TOML field is defaulted and validated exactly once here, so core logic
/// never re-checks an `Option` that loading already resolved.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub mode: FeedMode,
    pub api_key: String,
    pub identity: Identity,
    pub socket_timeout: Duration,
    pub full_queue_pause: Duration,
    pub empty_batch_backoff: Duration,
    pub max_connections: usize,
    pub queue_size: usize,
    pub report_content: bool,
    pub robots_cache_ttl: Duration,
    pub host_pool_size: usize,
    pub host_pool_idle_timeout: Duration,
}

impl ResolvedConfig {
    pub fn from_config(config: &WorkerConfig, api_key_env: Option<String>) -> Result<Self, WorkerError> {
        let mode = match (&config.manager_url, &config.stream_input) {
            (Some(url), None) => FeedMode::Server {
                manager_url: url.trim_end_matches('/').to_string(),
            },
            (None, Some(path)) => FeedMode::Stream {
                path: path.clone(),
                input_is_plain: config.input_is_plain,
            },
            (Some(_), Some(_)) => {
                return Err(WorkerError::Config(
                    "exactly one of `manager_url` or `stream_input` must be set, not both"
                        .to_string(),
                ));
            }
            (None, None) => {
                return Err(WorkerError::Config(
                    "exactly one of `manager_url` or `stream_input` must be set".to_string(),
                ));
            }
        };

        let api_key = api_key_env
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let identity = config.identity.clone().ok_or_else(|| {
            WorkerError::Config("`identity.user_agent` and `identity.name` are required".to_string())
        })?;

        let max_connections = config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_connections == 0 {
            return Err(WorkerError::Config(
                "`max_connections` must be greater than zero".to_string(),
            ));
        }

        let queue_size = config.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE);
        if queue_size == 0 {
            return Err(WorkerError::Config(
                "`queue_size` must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            mode,
            api_key,
            identity,
            socket_timeout: Duration::from_secs(
                config.socket_timeout.unwrap_or(DEFAULT_SOCKET_TIMEOUT_SECS),
            ),
            full_queue_pause: Duration::from_secs(
                config
                    .full_queue_pause
                    .unwrap_or(DEFAULT_FULL_QUEUE_PAUSE_SECS),
            ),
            empty_batch_backoff: Duration::from_secs(EMPTY_BATCH_BACKOFF_SECS),
            max_connections,
            queue_size,
            report_content: config.report_content.unwrap_or(true),
            robots_cache_ttl: Duration::from_secs(
                config
                    .robots_cache_ttl
                    .unwrap_or(DEFAULT_ROBOTS_CACHE_TTL_SECS),
            ),
            host_pool_size: config.host_pool_size.unwrap_or(DEFAULT_HOST_POOL_SIZE),
            host_pool_idle_timeout: Duration::from_secs(
                config
                    .host_pool_idle_timeout
                    .unwrap_or(DEFAULT_HOST_POOL_IDLE_TIMEOUT_SECS),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Identity;

    fn base_config() -> WorkerConfig {
        WorkerConfig {
            identity: Some(Identity {
                user_agent: "TestBot/1.0".to_string(),
                name: "TestBot".to_string(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn requires_exactly_one_mode() {
        let config = base_config();
        assert!(ResolvedConfig::from_config(&config, None).is_err());

        let mut both = base_config();
        both.manager_url = Some("https://example.com".to_string());
        both.stream_input = Some("-".to_string());
        assert!(ResolvedConfig::from_config(&both, None).is_err());
    }

    #[test]
    fn applies_defaults() {
        let mut config = base_config();
        config.manager_url = Some("https://example.com/".to_string());
        let resolved = ResolvedConfig::from_config(&config, None).unwrap();
        assert_eq!(resolved.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(resolved.queue_size, DEFAULT_QUEUE_SIZE);
        assert!(resolved.report_content);
        assert!(matches!(resolved.mode, FeedMode::Server { manager_url } if manager_url == "https://example.com"));
    }

    #[test]
    fn env_api_key_overrides_config() {
        let mut config = base_config();
        config.manager_url = Some("https://example.com".to_string());
        config.api_key = Some("from-file".to_string());
        let resolved =
            ResolvedConfig::from_config(&config, Some("from-env".to_string())).unwrap();
        assert_eq!(resolved.api_key, "from-env");
    }

    #[test]
    fn rejects_zero_max_connections() {
        let mut config = base_config();
        config.manager_url = Some("https://example.com".to_string());
        config.max_connections = Some(0);
        assert!(ResolvedConfig::from_config(&config, None).is_err());
    }
}
