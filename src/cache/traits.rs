//! Cache storage trait and stored-response types.

use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::http::{Request, Response};

/// A response replayed from a cache partition.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  /// The stored response
  pub response: Response,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Trait for partition-based cache storage backends.
///
/// Partitions are named, durable key-value stores created lazily on
/// first write; they persist until explicitly deleted. Within a
/// partition each request key maps to at most one stored response and
/// writes overwrite. Backends serialize conflicting writes internally;
/// callers perform no additional locking.
pub trait CacheStorage: Send + Sync {
  /// Store a response, overwriting any previous entry for the request.
  fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<()>;

  /// Transactional bulk store: either every entry lands or none do.
  fn put_many(&self, partition: &str, entries: &[(Request, Response)]) -> Result<()>;

  /// Partition-scoped lookup.
  fn match_in(&self, partition: &str, request: &Request) -> Result<Option<CachedResponse>>;

  /// Lookup across every partition, oldest partition first.
  fn match_any(&self, request: &Request) -> Result<Option<CachedResponse>>;

  /// Names of all existing partitions, in creation order.
  fn partition_names(&self) -> Result<Vec<String>>;

  /// Delete a partition and everything in it. Returns true if it
  /// existed.
  fn delete_partition(&self, name: &str) -> Result<bool>;
}
