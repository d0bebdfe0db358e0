/// A single unit of crawl work: one URL to fetch.
///
/// Constructed by the Feeder; consumed exactly once by a pipeline worker.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Job {
    pub url: String,
}

impl Job {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl std::str::FromStr for Job {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Job::new(s))
    }
}
