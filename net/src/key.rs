use std::fmt;

/// Scheme + authority, the granularity every per-host pool and cache keys
/// on (`spec.md` §4.2/§4.3: "one connection pool per (scheme, host, port)").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey {
    scheme: String,
    authority: String,
}

impl HostKey {
    pub fn from_url(url: &url::Url) -> Option<Self> {
        let authority = url.host_str()?.to_string();
        let authority = match url.port() {
            Some(port) => format!("{authority}:{port}"),
            None => authority,
        };
        Some(Self {
            scheme: url.scheme().to_string(),
            authority,
        })
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}
