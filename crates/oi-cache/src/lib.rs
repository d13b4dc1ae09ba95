//! Low-latency cache for open-interest windows.
//!
//! Holds, per symbol:
//! - the sliding window of the most recent historical samples
//! - the latest current snapshot
//! - the hysteresis guard left by the last alert
//!
//! `RedisCache` is the production backend; `MemoryCache` has the same
//! semantics and backs the tests.

pub mod cache;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_cache;

pub use cache::{WindowCache, DEFAULT_WINDOW_SIZE};
pub use error::{CacheError, CacheResult};
pub use keys::Namespace;
pub use memory::MemoryCache;
pub use redis_cache::{RedisCache, RedisSettings};
