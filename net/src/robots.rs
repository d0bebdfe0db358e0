use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tendril_types::RobotsCheckError;
use tokio::sync::Mutex;
use tracing::debug;

/// One `User-agent:` group and its rules, in file order.
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

struct Rule {
    allow: bool,
    pattern: String,
}

/// A parsed robots.txt, pre-narrowed to the single group that applies to
/// our identity (RFC 9309 §2.2.1: longest matching, case-insensitive
/// `User-agent` token wins; `*` is the fallback group) — or a constant
/// allow/deny predicate for the robots.txt response-status cases that
/// never reach a body parse (`spec.md` §4.3 step 3).
pub struct RobotsPolicy {
    kind: PolicyKind,
}

enum PolicyKind {
    Rules(Vec<Rule>),
    AllowAll,
    DenyAll,
}

impl RobotsPolicy {
    pub fn parse(body: &str, user_agent_token: &str) -> Self {
        let groups = parse_groups(body);
        let rules = select_group(&groups, user_agent_token)
            .map(|g| {
                g.rules
                    .iter()
                    .map(|r| Rule {
                        allow: r.allow,
                        pattern: r.pattern.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { kind: PolicyKind::Rules(rules) }
    }

    pub fn allow_all() -> Self {
        Self { kind: PolicyKind::AllowAll }
    }

    pub fn deny_all() -> Self {
        Self { kind: PolicyKind::DenyAll }
    }

    /// Longest-rule-wins matching, `Allow` breaking ties (RFC 9309 §2.2.2).
    pub fn is_allowed(&self, path: &str) -> bool {
        let rules = match &self.kind {
            PolicyKind::AllowAll => return true,
            PolicyKind::DenyAll => return false,
            PolicyKind::Rules(rules) => rules,
        };

        let mut best: Option<&Rule> = None;
        for rule in rules {
            if !path_matches(&rule.pattern, path) {
                continue;
            }
            best = match best {
                None => Some(rule),
                Some(current) => {
                    if effective_length(&rule.pattern) > effective_length(&current.pattern) {
                        Some(rule)
                    } else if effective_length(&rule.pattern) == effective_length(&current.pattern)
                        && rule.allow
                        && !current.allow
                    {
                        Some(rule)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best.map_or(true, |r| r.allow)
    }
}

fn parse_groups(body: &str) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut current_agents: Vec<String> = Vec::new();
    let mut current_rules: Vec<Rule> = Vec::new();
    let mut in_group = false;

    for line in body.lines() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();

        match field.as_str() {
            "user-agent" => {
                if in_group && !current_rules.is_empty() {
                    groups.push(Group {
                        agents: std::mem::take(&mut current_agents),
                        rules: std::mem::take(&mut current_rules),
                    });
                    in_group = false;
                }
                current_agents.push(value.to_ascii_lowercase());
                in_group = true;
            }
            "allow" | "disallow" if in_group => {
                if !value.is_empty() || field == "disallow" {
                    current_rules.push(Rule {
                        allow: field == "allow",
                        pattern: value.to_string(),
                    });
                }
            }
            _ => {}
        }
    }
    if in_group {
        groups.push(Group {
            agents: current_agents,
            rules: current_rules,
        });
    }
    groups
}

fn strip_comment(line: &str) -> &str {
    line.find('#').map_or(line, |i| &line[..i])
}

fn select_group<'a>(groups: &'a [Group], user_agent_token: &str) -> Option<&'a Group> {
    let token = user_agent_token.to_ascii_lowercase();
    let mut best: Option<(&Group, usize)> = None;
    let mut wildcard: Option<&Group> = None;

    for group in groups {
        for agent in &group.agents {
            if agent == "*" {
                wildcard.get_or_insert(group);
                continue;
            }
            if token.contains(agent.as_str()) {
                let specificity = agent.len();
                if best.map_or(true, |(_, len)| specificity > len) {
                    best = Some((group, specificity));
                }
            }
        }
    }
    best.map(|(g, _)| g).or(wildcard)
}

/// `*` matches any run of characters, `$` anchors to end-of-path.
fn path_matches(pattern: &str, path: &str) -> bool {
    if pattern.is_empty() {
        return true;
    }
    let anchored = pattern.ends_with('$');
    let pattern = pattern.strip_suffix('$').unwrap_or(pattern);
    let segments: Vec<&str> = pattern.split('*').collect();

    let mut rest = path;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            if !rest.starts_with(segment) {
                return false;
            }
            rest = &rest[segment.len()..];
        } else if let Some(pos) = rest.find(segment) {
            rest = &rest[pos + segment.len()..];
        } else {
            return false;
        }
    }
    if anchored {
        rest.is_empty()
    } else {
        true
    }
}

fn effective_length(pattern: &str) -> usize {
    pattern.len()
}

struct CacheSlot {
    policy: Option<Arc<RobotsPolicy>>,
    fetched_at: Instant,
}

/// What the caller's robots.txt fetch resolved to, already classified by
/// response status (`spec.md` §4.3 step 3): a body to parse, or a constant
/// predicate for the status codes that never reach a body parse.
pub enum RobotsFetchOutcome {
    Body(String),
    AllowAll,
    DenyAll,
}

/// Per-host robots.txt acquisition cache (`spec.md` §4.3, C3): a
/// specialization of the pool-map archetype where the pooled resource is a
/// predicate (the parsed policy) rather than a connection, pool size per
/// key is 1, and staleness is TTL-based rather than idle-timeout-based.
/// The per-key `Mutex` doubles as the singleflight lock: a second caller
/// for the same host blocks on the fetch-in-progress instead of issuing a
/// redundant request.
pub struct RobotsCache {
    ttl: Duration,
    slots: std::sync::Mutex<HashMap<String, Arc<Mutex<Option<CacheSlot>>>>>,
}

impl RobotsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn slot_for(&self, host: &str) -> Arc<Mutex<Option<CacheSlot>>> {
        let mut slots = self.slots.lock().expect("robots cache lock poisoned");
        slots
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Returns the policy for `host`, fetching and classifying via
    /// `fetch_robots` if there is no entry or the cached one has expired.
    /// `fetch_robots` runs with the per-host slot locked, so concurrent jobs
    /// for the same host share one fetch.
    ///
    /// A genuine transport failure (`Err`) is a real error, not a reason to
    /// allow everything: it is returned to the caller uncached so the next
    /// job retries the fetch (`spec.md` §4.3 step 2/4).
    pub async fn get<F, Fut>(
        &self,
        host: &str,
        user_agent_token: &str,
        fetch_robots: F,
    ) -> Result<Arc<RobotsPolicy>, RobotsCheckError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<RobotsFetchOutcome, String>>,
    {
        let slot = self.slot_for(host);
        let mut guard = slot.lock().await;

        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                if let Some(policy) = &cached.policy {
                    return Ok(policy.clone());
                }
            }
        }

        debug!(host, "fetching robots.txt");
        let outcome = fetch_robots().await.map_err(RobotsCheckError::Fetch)?;
        let policy = Arc::new(match outcome {
            RobotsFetchOutcome::Body(body) => RobotsPolicy::parse(&body, user_agent_token),
            RobotsFetchOutcome::AllowAll => RobotsPolicy::allow_all(),
            RobotsFetchOutcome::DenyAll => RobotsPolicy::deny_all(),
        });

        *guard = Some(CacheSlot {
            policy: Some(policy.clone()),
            fetched_at: Instant::now(),
        });
        Ok(policy)
    }
}
