//! Caching subsystem.
//!
//! Two caches share one key type, [`CacheKey`]:
//!
//! - [`response::ResponseCache`]: normalized primary-provider answers with
//!   per-operation TTLs. Checked first on every dispatch.
//!
//! - [`failure::FailureCache`]: keys whose primary call returned 403/429.
//!   A fresh record sends the request straight to the fallback provider.

pub mod failure;
pub mod key;
pub mod response;

pub use failure::{FailureCache, FailureCacheConfig, FailureRecord};
pub use key::{CacheKey, CacheKeyBuilder, Operation};
pub use response::{CacheConfig, Cacheable, CachedResponse, ResponseCache};
