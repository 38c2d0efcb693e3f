//! Request interception: per-request cache strategy selection.
//!
//! The interceptor owns two partitions. The static partition is named
//! by the current generation tag, seeded at install and swept at
//! activation. The data partition has a fixed name and collects API
//! responses under the network-first strategy.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::http::{FetchReply, Request, RequestMode, Response};
use crate::net::Network;
use crate::worker::events::EventScope;

/// Fallback payload for API requests that fail while nothing is
/// cached. Byte-exact wire format; clients already parse it.
const OFFLINE_BODY: &str =
  r#"{"offline":true,"message":"Offline data - may be outdated","cached":true}"#;

/// Applies one of two caching strategies per intercepted request:
/// network-first for API requests, cache-first for everything else.
///
/// Handling is stateless per invocation; the only cross-request state
/// is cache contents. Cloning shares storage and network handles.
pub struct RequestInterceptor<S, N> {
  config: Arc<WorkerConfig>,
  storage: Arc<S>,
  network: Arc<N>,
}

impl<S: CacheStorage + 'static, N: Network> RequestInterceptor<S, N> {
  pub fn new(config: WorkerConfig, storage: S, network: N) -> Self {
    Self {
      config: Arc::new(config),
      storage: Arc::new(storage),
      network: Arc::new(network),
    }
  }

  /// Storage handle, shared with any clones.
  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Network handle, shared with any clones.
  pub fn network(&self) -> &N {
    &self.network
  }

  /// Name of the static partition for the current generation.
  fn static_partition(&self) -> &str {
    &self.config.static_generation
  }

  /// Partition names the activation sweep must leave alone. The data
  /// partition is unversioned and deliberately exempt.
  fn allow_list(&self) -> [&str; 2] {
    [&self.config.static_generation, &self.config.data_cache_name]
  }

  /// Whether a request is subject to network-first handling.
  pub fn is_api_request(&self, request: &Request) -> bool {
    self
      .config
      .api_patterns
      .iter()
      .any(|pattern| pattern.is_match(&request.url))
  }

  /// Install: seed the static partition with the app shell.
  ///
  /// All-or-nothing: one failed seed fetch fails the whole install and
  /// nothing is stored; the host retries installation later. Readiness
  /// to supersede a waiting worker is signaled up front.
  pub async fn install(&self, scope: &EventScope) -> Result<()> {
    scope.skip_waiting();

    let mut entries = Vec::with_capacity(self.config.seed_resources.len());
    for url in &self.config.seed_resources {
      let request = Request::get(url);
      let response = self
        .network
        .fetch(&request)
        .await
        .map_err(|e| eyre!("Failed to fetch seed resource {}: {}", url, e))?;

      if !response.is_success() {
        return Err(eyre!(
          "Seed resource {} returned status {}",
          url,
          response.status
        ));
      }

      entries.push((request, response));
    }

    self.storage.put_many(self.static_partition(), &entries)?;
    info!(
      "Seeded {} resources into {}",
      entries.len(),
      self.static_partition()
    );

    Ok(())
  }

  /// Activation sweep: delete every partition from an older
  /// generation. Best-effort; individual deletion failures are logged
  /// and do not fail activation. Idempotent.
  pub async fn activate(&self) -> Result<()> {
    let allow = self.allow_list();

    for name in self.storage.partition_names()? {
      if allow.contains(&name.as_str()) {
        continue;
      }
      match self.storage.delete_partition(&name) {
        Ok(true) => info!("Deleted stale cache partition {}", name),
        Ok(false) => {}
        Err(e) => warn!("Failed to delete cache partition {}: {}", name, e),
      }
    }

    Ok(())
  }

  /// Dispatch a fetch to the matching strategy.
  ///
  /// Network failures are always recovered locally into a degraded
  /// response (or an explicit [`FetchReply::NoResponse`]); only
  /// storage errors propagate.
  pub async fn handle_fetch(&self, scope: &EventScope, request: &Request) -> Result<FetchReply> {
    if self.is_api_request(request) {
      self.network_first(request).await
    } else {
      self.cache_first(scope, request).await
    }
  }

  /// Network-first with cache fallback, for API data.
  async fn network_first(&self, request: &Request) -> Result<FetchReply> {
    match self.network.fetch(request).await {
      Ok(response) => {
        // Only a clean 200 is worth replaying offline
        if response.status == 200 {
          self
            .storage
            .put(&self.config.data_cache_name, request, &response)?;
        }
        Ok(FetchReply::Response(response))
      }
      Err(e) => {
        debug!("Network fetch failed for {}: {}", request.url, e);

        if let Some(cached) = self
          .storage
          .match_in(&self.config.data_cache_name, request)?
        {
          return Ok(FetchReply::Response(cached.response));
        }

        Ok(FetchReply::Response(offline_json()))
      }
    }
  }

  /// Cache-first for static assets. On a miss the live response is
  /// returned right away; the cache write is registered with the event
  /// scope instead of blocking the caller.
  async fn cache_first(&self, scope: &EventScope, request: &Request) -> Result<FetchReply> {
    if let Some(cached) = self.storage.match_any(request)? {
      return Ok(FetchReply::Response(cached.response));
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        if response.status == 200 {
          let storage = Arc::clone(&self.storage);
          let partition = self.config.static_generation.clone();
          let request = request.clone();
          let copy = response.clone();
          scope.wait_until(async move {
            if let Err(e) = storage.put(&partition, &request, &copy) {
              warn!("Background cache write for {} failed: {}", request.url, e);
            }
          });
        }
        Ok(FetchReply::Response(response))
      }
      Err(e) => {
        debug!("Network fetch failed for {}: {}", request.url, e);

        if request.mode == RequestMode::Navigate {
          // Fall back to the cached root document for page loads
          if let Some(cached) = self.storage.match_any(&Request::get("/"))? {
            return Ok(FetchReply::Response(cached.response));
          }
          return Ok(FetchReply::Response(offline_text()));
        }

        Ok(FetchReply::NoResponse)
      }
    }
  }
}

impl<S, N> Clone for RequestInterceptor<S, N> {
  fn clone(&self) -> Self {
    Self {
      config: Arc::clone(&self.config),
      storage: Arc::clone(&self.storage),
      network: Arc::clone(&self.network),
    }
  }
}

fn offline_json() -> Response {
  Response::ok(OFFLINE_BODY).with_header("content-type", "application/json")
}

fn offline_text() -> Response {
  Response::ok("Offline").with_header("content-type", "text/plain")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStorage;
  use crate::net::testing::MockNetwork;

  const WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather?q=pune";

  fn interceptor() -> RequestInterceptor<MemoryStorage, MockNetwork> {
    RequestInterceptor::new(
      WorkerConfig::farmer_market().unwrap(),
      MemoryStorage::new(),
      MockNetwork::new(),
    )
  }

  fn seed_network(network: &MockNetwork) {
    network.respond("/", Response::ok("<html>home</html>"));
    network.respond("/static/manifest.json", Response::ok("{}"));
    network.respond("/static/icon-192.png", Response::ok("png192"));
    network.respond("/static/icon-512.png", Response::ok("png512"));
  }

  #[tokio::test]
  async fn test_install_seeds_every_resource() {
    let interceptor = interceptor();
    seed_network(&interceptor.network);

    let scope = EventScope::new();
    interceptor.install(&scope).await.unwrap();

    assert!(scope.skip_waiting_requested());
    for url in &interceptor.config.seed_resources {
      let cached = interceptor
        .storage
        .match_in("farmer-market-v1", &Request::get(url))
        .unwrap();
      assert!(cached.is_some(), "missing seed entry for {}", url);
    }
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing() {
    let interceptor = interceptor();
    seed_network(&interceptor.network);
    interceptor.network.fail("/static/icon-512.png");

    let scope = EventScope::new();
    assert!(interceptor.install(&scope).await.is_err());

    // Nothing stored, not even the seeds fetched before the failure
    assert!(interceptor.storage.partition_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_activation_sweeps_old_generations() {
    let interceptor = interceptor();
    let request = Request::get("/");
    let storage = &interceptor.storage;
    storage.put("farmer-market-v0", &request, &Response::ok("old")).unwrap();
    storage.put("farmer-market-data-v1", &request, &Response::ok("data")).unwrap();
    storage.put("farmer-market-v1", &request, &Response::ok("new")).unwrap();

    interceptor.activate().await.unwrap();

    assert_eq!(
      storage.partition_names().unwrap(),
      vec!["farmer-market-data-v1", "farmer-market-v1"]
    );
  }

  #[tokio::test]
  async fn test_activation_is_idempotent() {
    let interceptor = interceptor();
    let request = Request::get("/");
    interceptor
      .storage
      .put("farmer-market-v1", &request, &Response::ok("home"))
      .unwrap();

    interceptor.activate().await.unwrap();
    interceptor.activate().await.unwrap();

    assert_eq!(
      interceptor.storage.partition_names().unwrap(),
      vec!["farmer-market-v1"]
    );
  }

  #[tokio::test]
  async fn test_api_success_is_cached_in_data_partition() {
    let interceptor = interceptor();
    let body = r#"{"temp":31}"#;
    interceptor.network.respond(WEATHER_URL, Response::ok(body));

    let scope = EventScope::new();
    let request = Request::get(WEATHER_URL);
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();

    assert_eq!(reply.into_response().unwrap().body_text(), body);

    let cached = interceptor
      .storage
      .match_in("farmer-market-data-v1", &request)
      .unwrap()
      .unwrap();
    assert_eq!(cached.response.body_text(), body);
    assert_eq!(cached.response.status, 200);
  }

  #[tokio::test]
  async fn test_api_non_200_bypasses_cache_write() {
    let interceptor = interceptor();
    interceptor
      .network
      .respond(WEATHER_URL, Response::new(503).with_body("unavailable"));

    let scope = EventScope::new();
    let request = Request::get(WEATHER_URL);
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();

    assert_eq!(reply.into_response().unwrap().status, 503);
    assert!(interceptor
      .storage
      .match_in("farmer-market-data-v1", &request)
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_api_failure_replays_cached_data() {
    let interceptor = interceptor();
    let request = Request::get(WEATHER_URL);
    interceptor
      .storage
      .put("farmer-market-data-v1", &request, &Response::ok("stale-data"))
      .unwrap();

    let scope = EventScope::new();
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();

    assert_eq!(reply.into_response().unwrap().body_text(), "stale-data");
  }

  #[tokio::test]
  async fn test_api_failure_without_cache_synthesizes_offline_json() {
    let interceptor = interceptor();

    let scope = EventScope::new();
    let request = Request::get(WEATHER_URL);
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();

    let response = reply.into_response().unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(
      response.body_text(),
      r#"{"offline":true,"message":"Offline data - may be outdated","cached":true}"#
    );
  }

  #[tokio::test]
  async fn test_static_hit_never_touches_the_network() {
    let interceptor = interceptor();
    let request = Request::get("/static/icon-192.png");
    interceptor
      .storage
      .put("farmer-market-v1", &request, &Response::ok("png192"))
      .unwrap();

    let scope = EventScope::new();
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();

    assert_eq!(reply.into_response().unwrap().body_text(), "png192");
    assert_eq!(interceptor.network.calls(), 0);
  }

  #[tokio::test]
  async fn test_static_miss_caches_in_background() {
    let interceptor = interceptor();
    let request = Request::get("/static/style.css");
    interceptor
      .network
      .respond("/static/style.css", Response::ok("body{}"));

    let scope = EventScope::new();
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();
    assert_eq!(reply.into_response().unwrap().body_text(), "body{}");

    // The write is registered background work, visible after settle
    scope.settle().await;
    let cached = interceptor
      .storage
      .match_in("farmer-market-v1", &request)
      .unwrap()
      .unwrap();
    assert_eq!(cached.response.body_text(), "body{}");
  }

  #[tokio::test]
  async fn test_static_miss_non_200_is_returned_uncached() {
    let interceptor = interceptor();
    let request = Request::get("/missing.png");
    interceptor
      .network
      .respond("/missing.png", Response::new(404));

    let scope = EventScope::new();
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();
    assert_eq!(reply.into_response().unwrap().status, 404);

    scope.settle().await;
    assert!(interceptor.storage.match_any(&request).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_navigation_failure_falls_back_to_cached_root() {
    let interceptor = interceptor();
    interceptor
      .storage
      .put(
        "farmer-market-v1",
        &Request::get("/"),
        &Response::ok("<html>home</html>"),
      )
      .unwrap();

    let scope = EventScope::new();
    let request = Request::navigate("/market/prices");
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();

    assert_eq!(
      reply.into_response().unwrap().body_text(),
      "<html>home</html>"
    );
  }

  #[tokio::test]
  async fn test_navigation_failure_without_root_is_plain_offline() {
    let interceptor = interceptor();

    let scope = EventScope::new();
    let request = Request::navigate("/market/prices");
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();

    let response = reply.into_response().unwrap();
    assert_eq!(response.body_text(), "Offline");
    assert_eq!(response.header("content-type"), Some("text/plain"));
  }

  #[tokio::test]
  async fn test_non_navigation_failure_yields_no_response() {
    let interceptor = interceptor();

    let scope = EventScope::new();
    let request = Request::get("/static/other.js");
    let reply = interceptor.handle_fetch(&scope, &request).await.unwrap();

    assert!(!reply.is_response());
  }
}
