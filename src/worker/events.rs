//! Lifecycle event plumbing shared by the worker and its host.

use color_eyre::Result;
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::http::{FetchReply, Request};
use crate::worker::push::Notification;

/// Extended-lifetime registry for a single lifecycle event.
///
/// Any asynchronous action with an externally observable side effect
/// (cache write, notification display, client enumeration) must be
/// registered here; the host keeps the worker alive until everything
/// registered has settled. Unregistered work may be torn down with the
/// event's scope.
pub struct EventScope {
  tasks: Mutex<Vec<JoinHandle<()>>>,
  skip_waiting: AtomicBool,
}

impl EventScope {
  pub fn new() -> Self {
    Self {
      tasks: Mutex::new(Vec::new()),
      skip_waiting: AtomicBool::new(false),
    }
  }

  /// Register background work with this event. The work starts
  /// immediately; the caller does not wait for it.
  pub fn wait_until<F>(&self, fut: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let handle = tokio::spawn(fut);
    self
      .tasks
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(handle);
  }

  /// Await every piece of registered background work.
  pub async fn settle(&self) {
    let handles: Vec<JoinHandle<()>> = {
      let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
      tasks.drain(..).collect()
    };

    for result in join_all(handles).await {
      if let Err(e) = result {
        warn!("Background task failed to settle: {}", e);
      }
    }
  }

  /// Ask the host to promote this worker version immediately instead
  /// of waiting for open clients to close.
  pub fn skip_waiting(&self) {
    self.skip_waiting.store(true, Ordering::SeqCst);
  }

  pub fn skip_waiting_requested(&self) -> bool {
    self.skip_waiting.load(Ordering::SeqCst)
  }
}

impl Default for EventScope {
  fn default() -> Self {
    Self::new()
  }
}

/// Lifecycle handler implemented by the worker core.
///
/// One method per host event; the host owns dispatch ordering and the
/// event scope, the handler owns behavior.
#[allow(async_fn_in_trait)]
pub trait WorkerHandler: Send + Sync {
  /// Triggered once per worker version, before activation.
  async fn on_install(&self, scope: &EventScope) -> Result<()>;

  /// Triggered once the new version takes control.
  async fn on_activate(&self, scope: &EventScope) -> Result<()>;

  /// Triggered for every outgoing request while this version is
  /// active.
  async fn on_fetch(&self, scope: &EventScope, request: &Request) -> Result<FetchReply>;

  /// Triggered on an incoming push message; payload bytes are opaque.
  async fn on_push(&self, scope: &EventScope, payload: Option<&[u8]>) -> Result<()>;

  /// Triggered when the user activates a displayed notification.
  async fn on_notification_click(
    &self,
    scope: &EventScope,
    notification: &Notification,
  ) -> Result<()>;

  /// Triggered on a background sync wakeup with the registered tag.
  async fn on_sync(&self, scope: &EventScope, tag: &str) -> Result<()>;
}
