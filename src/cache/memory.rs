//! In-memory cache partitions.
//!
//! Used by tests and by hosts without a filesystem. Same semantics as
//! the SQLite backend minus durability.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::traits::{CacheStorage, CachedResponse};
use crate::http::{Request, Response};

struct Partition {
  name: String,
  entries: HashMap<String, CachedResponse>,
}

/// Non-durable partition store.
#[derive(Default)]
pub struct MemoryStorage {
  // Vec preserves partition creation order for un-scoped matches
  partitions: Mutex<Vec<Partition>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

fn entry(response: &Response) -> CachedResponse {
  CachedResponse {
    response: response.clone(),
    cached_at: Utc::now(),
  }
}

impl CacheStorage for MemoryStorage {
  fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<()> {
    let mut partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if let Some(existing) = partitions.iter_mut().find(|p| p.name == partition) {
      existing.entries.insert(request.cache_key(), entry(response));
    } else {
      let mut entries = HashMap::new();
      entries.insert(request.cache_key(), entry(response));
      partitions.push(Partition {
        name: partition.to_string(),
        entries,
      });
    }

    Ok(())
  }

  fn put_many(&self, partition: &str, entries: &[(Request, Response)]) -> Result<()> {
    // Single lock acquisition makes the bulk write atomic
    let mut partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let target = match partitions.iter_mut().find(|p| p.name == partition) {
      Some(existing) => existing,
      None => {
        partitions.push(Partition {
          name: partition.to_string(),
          entries: HashMap::new(),
        });
        partitions
          .last_mut()
          .ok_or_else(|| eyre!("Partition vanished during bulk store"))?
      }
    };

    for (request, response) in entries {
      target.entries.insert(request.cache_key(), entry(response));
    }

    Ok(())
  }

  fn match_in(&self, partition: &str, request: &Request) -> Result<Option<CachedResponse>> {
    let partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      partitions
        .iter()
        .find(|p| p.name == partition)
        .and_then(|p| p.entries.get(&request.cache_key()).cloned()),
    )
  }

  fn match_any(&self, request: &Request) -> Result<Option<CachedResponse>> {
    let partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let key = request.cache_key();
    Ok(
      partitions
        .iter()
        .find_map(|p| p.entries.get(&key).cloned()),
    )
  }

  fn partition_names(&self) -> Result<Vec<String>> {
    let partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(partitions.iter().map(|p| p.name.clone()).collect())
  }

  fn delete_partition(&self, name: &str) -> Result<bool> {
    let mut partitions = self
      .partitions
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let before = partitions.len();
    partitions.retain(|p| p.name != name);

    Ok(partitions.len() < before)
  }
}
