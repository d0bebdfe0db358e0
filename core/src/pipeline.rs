use std::sync::Arc;

use chrono::Utc;
use tendril_net::{FetchOutcome, Fetcher, RobotsCache, RobotsFetchOutcome};
use tendril_types::{FailureReason, Job, Report, ResolvedConfig, TIME_FORMAT};
use tracing::warn;
use url::Url;

use crate::extractor::extract_links;

/// Drive one job through validate -> robots -> fetch -> extract
/// (`spec.md` §4.6, C6). Every exit produces a `Report`; nothing here
/// escalates to the supervisor, matching `spec.md` §7's rule that only
/// queue-fetch failures are fatal.
pub async fn process_job(
    job: Job,
    config: &ResolvedConfig,
    fetcher: &Fetcher,
    robots_cache: &Arc<RobotsCache>,
) -> Report {
    let visited = || Utc::now().format(TIME_FORMAT).to_string();

    let url = match Url::parse(&job.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => url,
        Ok(_) | Err(_) => {
            return Report::failed(job.url, FailureReason::InvalidUri.to_string(), visited());
        }
    };

    if let Err(reason) = check_quoting(&url) {
        return Report::failed(job.url, reason.to_string(), visited());
    }

    match robots_allows(&url, config, fetcher, robots_cache).await {
        Ok(true) => {}
        Ok(false) => {
            return Report::failed(job.url, FailureReason::RobotsDenied.to_string(), visited());
        }
        Err(message) => {
            warn!(url = %job.url, %message, "robots.txt check failed");
            return Report::failed(job.url, message, visited());
        }
    }

    match fetcher.fetch(&url, config.socket_timeout).await {
        Ok(FetchOutcome::Timeout) => {
            Report::failed(job.url, FailureReason::FetchTimeout.to_string(), visited())
        }
        Ok(FetchOutcome::Success {
            status_code,
            body,
            total_time,
        }) => {
            let body_text = String::from_utf8_lossy(&body);
            let links = extract_links(&url, &body_text);
            Report {
                url: job.url,
                result: None,
                status_code: Some(status_code),
                content: if config.report_content { Some(body) } else { None },
                links: Some(links),
                visited: visited(),
                total_time: Some(total_time.as_millis() as u64),
            }
        }
        Err(e) => Report::failed(job.url, e.to_string(), visited()),
    }
}

async fn robots_allows(
    url: &Url,
    config: &ResolvedConfig,
    fetcher: &Fetcher,
    robots_cache: &Arc<RobotsCache>,
) -> Result<bool, String> {
    let host = url.host_str().ok_or("URL has no host")?.to_string();
    let robots_url = {
        let mut u = url.clone();
        u.set_path("/robots.txt");
        u.set_query(None);
        u.set_fragment(None);
        u
    };
    let timeout = config.socket_timeout;
    let fetcher_ref = fetcher;

    let policy = robots_cache
        .get(&host, &config.identity.name, move || {
            let robots_url = robots_url.clone();
            async move {
                match fetcher_ref.fetch(&robots_url, timeout).await {
                    // 2xx: parse the body and apply its rules.
                    Ok(FetchOutcome::Success { status_code, body, .. }) if (200..300).contains(&status_code) => {
                        Ok(RobotsFetchOutcome::Body(String::from_utf8_lossy(&body).into_owned()))
                    }
                    // Unauthorized/forbidden robots.txt: deny everything.
                    Ok(FetchOutcome::Success { status_code: 401 | 403, .. }) => Ok(RobotsFetchOutcome::DenyAll),
                    // Missing robots.txt, or any other client/server error: allow everything.
                    Ok(FetchOutcome::Success { status_code, .. }) if status_code >= 400 => {
                        Ok(RobotsFetchOutcome::AllowAll)
                    }
                    // 1xx, or a 3xx that survived redirect-following unresolved: deny everything.
                    Ok(FetchOutcome::Success { .. }) => Ok(RobotsFetchOutcome::DenyAll),
                    Ok(FetchOutcome::Timeout) => Err("robots.txt fetch timed out".to_string()),
                    Err(e) => Err(e.to_string()),
                }
            }
        })
        .await
        .map_err(|e| e.to_string())?;

    Ok(policy.is_allowed(url.path()))
}

fn check_quoting(url: &Url) -> Result<(), FailureReason> {
    let path = url.path();
    let mut bytes = Vec::with_capacity(path.len());
    let mut iter = path.bytes();

    while let Some(b) = iter.next() {
        if b == b'%' {
            let (Some(h1), Some(h2)) = (iter.next().and_then(hex_val), iter.next().and_then(hex_val)) else {
                return Err(FailureReason::MalformedQuoting);
            };
            bytes.push((h1 << 4) | h2);
        } else {
            bytes.push(b);
        }
    }

    std::str::from_utf8(&bytes)
        .map(|_| ())
        .map_err(|_| FailureReason::MalformedQuoting)
}

fn hex_val(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let raw = tendril_types::WorkerConfig {
            manager_url: Some("https://manager.example".to_string()),
            identity: Some(tendril_types::Identity {
                user_agent: "test/1.0".to_string(),
                name: "test".to_string(),
            }),
            ..Default::default()
        };
        let config = ResolvedConfig::from_config(&raw, None).unwrap();
        let fetcher = Fetcher::new(config.identity.user_agent.clone(), config.host_pool_size, config.host_pool_idle_timeout);
        let robots_cache = Arc::new(RobotsCache::new(config.robots_cache_ttl));

        let report = process_job(Job::new("ftp://example.com/"), &config, &fetcher, &robots_cache).await;
        assert_eq!(report.result.as_deref(), Some("Invalid URI"));
    }

    #[test]
    fn quoting_accepts_plain_path() {
        let url = Url::parse("https://example.com/a/b/c").unwrap();
        assert!(check_quoting(&url).is_ok());
    }

    #[test]
    fn quoting_rejects_invalid_percent_sequence() {
        let url = Url::parse("https://example.com/%zz").unwrap();
        assert!(check_quoting(&url).is_err());
    }

    #[test]
    fn quoting_rejects_non_utf8_decode() {
        let url = Url::parse("https://example.com/%ff%fe").unwrap();
        assert!(check_quoting(&url).is_err());
    }
}
