//! Caching
//!
//! - [`BoundedCache`] - fixed-capacity map with oldest-entry eviction

mod bounded;

pub use bounded::{BoundedCache, CacheStats};
