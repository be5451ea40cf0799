//! Namespaced, generation-versioned cache for HTTP responses.
//!
//! This module provides the local cache store backing offline support:
//! - two partitions (`static-assets`, `api-responses`), each pinned to a
//!   single live generation tag
//! - entries keyed by normalized request identity (method + URL)
//! - last-writer-wins overwrites, eviction only at activation time

mod storage;
mod traits;

pub use storage::{CacheStore, MemoryStore, SqliteStore};
pub use traits::{CachedResponse, Generations, Namespace, RequestIdentity, ResponseSource};
