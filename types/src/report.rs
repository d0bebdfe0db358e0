use serde::Serialize;
use std::string::FromUtf8Error;

/// Outcome record for one crawled `Job`.
///
/// Invariant: `visited` is always set before the report is handed to the
/// Reporter. Invariant: exactly one of {normal completion, `result` set to a
/// failure reason} holds — `status_code`/`content`/`links` are only
/// populated on a path that did not short-circuit to a failure.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub url: String,
    pub result: Option<String>,
    pub status_code: Option<u16>,
    /// Raw response bytes. Kept as bytes (not pre-decoded) because the wire
    /// format may need to drop this field on a non-UTF-8 encode failure
    /// without touching any other field (see `to_json`).
    pub content: Option<Vec<u8>>,
    pub links: Option<Vec<String>>,
    pub visited: String,
    pub total_time: Option<u64>,
}

impl Report {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn failed(url: impl Into<String>, reason: impl Into<String>, visited: String) -> Self {
        Self {
            url: url.into(),
            result: Some(reason.into()),
            visited,
            ..Default::default()
        }
    }

    /// Serialize for the wire. Fails iff `content` is present and not valid
    /// UTF-8; the Reporter is responsible for the documented retry-without-
    /// content fallback (`SPEC_FULL.md` §4.7 / `spec.md` §9).
    pub fn to_json(&self, include_content: bool) -> Result<serde_json::Value, FromUtf8Error> {
        let content = match (&self.content, include_content) {
            (Some(bytes), true) => Some(String::from_utf8(bytes.clone())?),
            _ => None,
        };

        Ok(serde_json::to_value(WireReport {
            url: &self.url,
            result: self.result.as_deref(),
            status_code: self.status_code,
            content: content.as_deref(),
            links: self.links.as_deref(),
            visited: &self.visited,
            total_time: self.total_time,
        })
        .expect("WireReport serialization cannot fail"))
    }

    /// Drop `content` and mark the reason a caller would see after the
    /// UTF-8 fallback retry, per `spec.md` §4.7.
    pub fn without_content(mut self) -> Self {
        self.content = None;
        self.result = Some("unicode decode error".to_string());
        self
    }
}

#[derive(Serialize)]
struct WireReport<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<&'a [String]>,
    visited: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_time: Option<u64>,
}
