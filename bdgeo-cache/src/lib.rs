//! TTL response cache for the Bangladesh geo API.
//!
//! Generic in-memory cache with configurable capacity, expiration, and
//! hit/miss accounting. Time comes from an injectable [`Clock`].

mod cache;
mod clock;

pub use cache::{CacheConfig, CacheStats, ResponseCache, MAX_CHECK_PERIOD};
pub use clock::{Clock, ManualClock, SystemClock};
