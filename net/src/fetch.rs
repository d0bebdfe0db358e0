use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tendril_types::FetchError;
use tracing::debug;
use url::Url;

use crate::key::HostKey;
use crate::pool::PoolMap;

/// Hard ceiling on a single response body, independent of any timeout:
/// a slow-but-within-deadline server streaming gigabytes must not be
/// allowed to exhaust worker memory (`spec.md` §5, bounded resource use).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const MAX_REDIRECTS: usize = 5;

pub enum FetchOutcome {
    Success {
        status_code: u16,
        body: Vec<u8>,
        total_time: Duration,
    },
    Timeout,
}

/// Per-host HTTP connection pool (C2) plus the single-GET fetch operation
/// (C1). One `reqwest::Client` per pool slot; `reqwest` already keeps its
/// own keep-alive pool internally; the `PoolMap` here bounds how many
/// concurrent in-flight requests a single host may have across the worker,
/// per `spec.md`'s per-host connection cap rather than relying on a global
/// `max_connections` alone.
pub struct Fetcher {
    host_pool: PoolMap<HostKey, Arc<reqwest::Client>>,
    user_agent: String,
    acquire_timeout: Duration,
}

impl Fetcher {
    pub fn new(user_agent: impl Into<String>, host_pool_size: usize, host_pool_idle_timeout: Duration) -> Self {
        Self {
            host_pool: PoolMap::new(host_pool_size, host_pool_idle_timeout),
            user_agent: user_agent.into(),
            acquire_timeout: Duration::from_secs(60),
        }
    }

    /// GET `url`, enforcing `timeout` as a wall-clock deadline covering
    /// connect, redirects, and body read. Redirects beyond `MAX_REDIRECTS`
    /// and bodies beyond `MAX_BODY_BYTES` fail the same as a transport
    /// error; a deadline miss returns `FetchOutcome::Timeout` rather than
    /// an `Err`, since it's a per-job outcome (`spec.md` §7), not a system
    /// fault.
    pub async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchOutcome, FetchError> {
        let key = HostKey::from_url(url).ok_or_else(|| FetchError("URL has no host".to_string()))?;
        let user_agent = self.user_agent.clone();

        let client_guard = self
            .host_pool
            .get(&key, self.acquire_timeout, || {
                build_client(user_agent.clone())
            })
            .await
            .map_err(|e| FetchError(e.to_string()))?;

        let started = Instant::now();
        let request = client_guard.get(url.clone());

        match tokio::time::timeout(timeout, request.send()).await {
            Err(_) => {
                debug!(%url, "fetch deadline exceeded");
                Ok(FetchOutcome::Timeout)
            }
            Ok(Err(e)) => Err(FetchError(e.to_string())),
            Ok(Ok(response)) => {
                let status_code = response.status().as_u16();
                let mut body = Vec::new();
                let mut stream = response.bytes_stream();

                let read = tokio::time::timeout(timeout.saturating_sub(started.elapsed()), async {
                    while let Some(chunk) = stream.next().await {
                        let chunk = chunk.map_err(|e| FetchError(e.to_string()))?;
                        if body.len() + chunk.len() > MAX_BODY_BYTES {
                            return Err(FetchError(format!(
                                "response body exceeded {MAX_BODY_BYTES} bytes"
                            )));
                        }
                        body.extend_from_slice(&chunk);
                    }
                    Ok(())
                })
                .await;

                match read {
                    Err(_) => Ok(FetchOutcome::Timeout),
                    Ok(Err(e)) => Err(e),
                    Ok(Ok(())) => Ok(FetchOutcome::Success {
                        status_code,
                        body,
                        total_time: started.elapsed(),
                    }),
                }
            }
        }
    }
}

async fn build_client(user_agent: String) -> Result<Arc<reqwest::Client>, String> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map(Arc::new)
        .map_err(|e| e.to_string())
}
