//! Time-limited cache for per-group data that is expensive to fetch.
//!
//! Entries are evicted lazily: an expired entry stays in memory until the next
//! lookup of its id, which deletes it and reports a miss.

mod ttl;

pub use ttl::{CachedGroupData, TtlCache};
#[cfg(test)]
pub use ttl::CacheEntry;
