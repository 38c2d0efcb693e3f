//! Named cache partitions for request/response pairs.
//!
//! This module provides the storage side of the worker:
//! - Partitions are created lazily on first write and persist across
//!   worker restarts (SQLite backend)
//! - Within a partition, each request key maps to at most one stored
//!   response; writes overwrite
//! - Partitions are destroyed only by explicit deletion during the
//!   activation sweep

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{CacheStorage, CachedResponse};
