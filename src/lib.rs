//! Offline-first caching worker core for the farmer market PWA.
//!
//! Reimplements the app's browser service worker as a host-driven
//! library. The core is the [`RequestInterceptor`]: per request it
//! applies either
//! - **network-first** (API data): prefer a live fetch, cache clean
//!   200s in the data partition, replay the cache when the network
//!   fails, and synthesize an offline JSON payload as a last resort;
//! - **cache-first** (static assets): serve the generation-tagged
//!   static partition, fetching and back-filling only on a miss, with
//!   the cached root document or a plain "Offline" page as navigation
//!   fallback.
//!
//! The static partition is seeded at install (all-or-nothing) and
//! older generations are swept at activation. A [`WorkerHost`] drives
//! the lifecycle and dispatches events to anything implementing
//! [`WorkerHandler`]; [`Worker`] is the full handler, wiring the
//! interceptor to host-provided notification and window collaborators.

pub mod cache;
pub mod config;
pub mod host;
pub mod http;
pub mod net;
pub mod worker;

pub use cache::{CacheStorage, CachedResponse, MemoryStorage, SqliteStorage};
pub use config::WorkerConfig;
pub use host::{LifecycleState, WorkerHost};
pub use http::{FetchReply, Request, RequestMode, Response};
pub use net::{HttpNetwork, Network};
pub use worker::{
  Clients, EventScope, Notification, NotificationSink, RequestInterceptor, WindowClient, Worker,
  WorkerHandler,
};
