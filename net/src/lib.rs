//! Networking layer for the crawler worker: the HTTP fetcher (C1), the
//! generic keyed resource pool it and the robots cache build on (C2), and
//! the per-host robots.txt acquisition cache (C3).

mod fetch;
mod key;
mod pool;
mod robots;

pub use fetch::{FetchOutcome, Fetcher};
pub use key::HostKey;
pub use pool::{PoolGuard, PoolMap};
pub use robots::{RobotsCache, RobotsFetchOutcome, RobotsPolicy};
