//! Host-side dispatch: the worker lifecycle state machine.
//!
//! The host owns ordering: install completes (or fails) before
//! activate begins, and only an activated worker intercepts fetches.
//! Fetch handling may run concurrently; background work registered by
//! a fetch event is parked and settled by the host afterwards.

use color_eyre::{eyre::eyre, Result};
use std::sync::Mutex;
use tracing::info;

use crate::http::{FetchReply, Request};
use crate::worker::{EventScope, Notification, WorkerHandler};

/// Lifecycle states of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  /// Registered but not yet installed
  New,
  Installing,
  /// Installed, waiting to take control
  Installed,
  Activating,
  /// In control; intercepting fetches
  Activated,
  /// Install failed; a later registration replaces it
  Redundant,
}

/// Drives a worker version through its lifecycle and dispatches events
/// to it.
pub struct WorkerHost<H> {
  handler: H,
  state: LifecycleState,
  skip_waiting: bool,
  pending: Mutex<Vec<EventScope>>,
}

impl<H: WorkerHandler> WorkerHost<H> {
  pub fn new(handler: H) -> Self {
    Self {
      handler,
      state: LifecycleState::New,
      skip_waiting: false,
      pending: Mutex::new(Vec::new()),
    }
  }

  pub fn state(&self) -> LifecycleState {
    self.state
  }

  /// Whether the worker asked to supersede a waiting predecessor
  /// immediately.
  pub fn skip_waiting_requested(&self) -> bool {
    self.skip_waiting
  }

  pub fn handler(&self) -> &H {
    &self.handler
  }

  /// Run the install event. On failure the version becomes redundant;
  /// the host retries by registering a new version later.
  pub async fn install(&mut self) -> Result<()> {
    if self.state != LifecycleState::New {
      return Err(eyre!("Install dispatched in state {:?}", self.state));
    }
    self.state = LifecycleState::Installing;

    let scope = EventScope::new();
    let result = self.handler.on_install(&scope).await;
    scope.settle().await;
    self.skip_waiting = scope.skip_waiting_requested();

    match result {
      Ok(()) => {
        self.state = LifecycleState::Installed;
        info!("Worker installed (skip_waiting={})", self.skip_waiting);
        Ok(())
      }
      Err(e) => {
        self.state = LifecycleState::Redundant;
        Err(e.wrap_err("Worker install failed"))
      }
    }
  }

  /// Run the activate event. Only valid once, after a successful
  /// install.
  pub async fn activate(&mut self) -> Result<()> {
    if self.state != LifecycleState::Installed {
      return Err(eyre!("Activate dispatched in state {:?}", self.state));
    }
    self.state = LifecycleState::Activating;

    let scope = EventScope::new();
    let result = self.handler.on_activate(&scope).await;
    scope.settle().await;

    match result {
      Ok(()) => {
        self.state = LifecycleState::Activated;
        info!("Worker activated");
        Ok(())
      }
      Err(e) => {
        self.state = LifecycleState::Installed;
        Err(e.wrap_err("Worker activate failed"))
      }
    }
  }

  /// Intercept a fetch. The reply is returned immediately; background
  /// work registered by the handler is parked until
  /// [`settle_pending`](Self::settle_pending).
  pub async fn fetch(&self, request: &Request) -> Result<FetchReply> {
    self.require_active("fetch")?;

    let scope = EventScope::new();
    let reply = self.handler.on_fetch(&scope, request).await?;
    self
      .pending
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(scope);

    Ok(reply)
  }

  /// Await background work registered by previously dispatched fetch
  /// events (the event's extended lifetime).
  pub async fn settle_pending(&self) {
    let scopes: Vec<EventScope> = {
      let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
      pending.drain(..).collect()
    };

    for scope in scopes {
      scope.settle().await;
    }
  }

  pub async fn push(&self, payload: Option<&[u8]>) -> Result<()> {
    self.require_active("push")?;

    let scope = EventScope::new();
    let result = self.handler.on_push(&scope, payload).await;
    scope.settle().await;
    result
  }

  pub async fn notification_click(&self, notification: &Notification) -> Result<()> {
    self.require_active("notificationclick")?;

    let scope = EventScope::new();
    let result = self.handler.on_notification_click(&scope, notification).await;
    scope.settle().await;
    result
  }

  pub async fn sync(&self, tag: &str) -> Result<()> {
    self.require_active("sync")?;

    let scope = EventScope::new();
    let result = self.handler.on_sync(&scope, tag).await;
    scope.settle().await;
    result
  }

  fn require_active(&self, event: &str) -> Result<()> {
    if self.state != LifecycleState::Activated {
      return Err(eyre!(
        "{} event dispatched in state {:?}",
        event,
        self.state
      ));
    }
    Ok(())
  }
}
