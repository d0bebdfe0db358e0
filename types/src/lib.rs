//! Domain types for the crawler worker: jobs, reports, configuration, and
//! the error taxonomy shared across the `tendril-*` crates.

mod config;
mod error;
mod job;
mod report;
mod resolved;

pub use config::{Identity, WorkerConfig};
pub use error::{FailureReason, PoolError, QueueFetchError, ReportError, RobotsCheckError, WorkerError};
pub use job::Job;
pub use report::Report;
pub use resolved::{FeedMode, ResolvedConfig};

/// The `datetime.strftime` format the original worker uses for `visited`:
/// no timezone suffix, second precision. Preserved exactly (see
/// `SPEC_FULL.md` §9, "TIME_FORMAT").
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
