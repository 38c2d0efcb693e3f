//! The background worker: lifecycle handler wiring the caching core to
//! its host, plus the push/notification/sync surfaces.

mod events;
mod interceptor;
mod push;

pub use events::{EventScope, WorkerHandler};
pub use interceptor::RequestInterceptor;
pub use push::{Clients, Notification, NotificationSink, WindowClient};

use color_eyre::Result;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::http::{FetchReply, Request};
use crate::net::Network;

/// Sync registration tag for queued offline actions.
const SYNC_TAG: &str = "sync-data";

/// The full worker: install/activate/fetch delegate to the
/// [`RequestInterceptor`]; push, notification-click and sync talk to
/// host-provided collaborators.
pub struct Worker<S, N, P, C> {
  interceptor: RequestInterceptor<S, N>,
  origin: String,
  notifications: Arc<P>,
  clients: Arc<C>,
}

impl<S, N, P, C> Worker<S, N, P, C>
where
  S: CacheStorage + 'static,
  N: Network,
  P: NotificationSink,
  C: Clients,
{
  pub fn new(config: WorkerConfig, storage: S, network: N, notifications: P, clients: C) -> Self {
    let origin = config.origin.clone();
    Self {
      interceptor: RequestInterceptor::new(config, storage, network),
      origin,
      notifications: Arc::new(notifications),
      clients: Arc::new(clients),
    }
  }

  pub fn interceptor(&self) -> &RequestInterceptor<S, N> {
    &self.interceptor
  }

  /// Sync queued offline actions. The upload queue does not exist yet;
  /// this only records that a sync pass ran.
  async fn sync_offline_data(&self) -> Result<()> {
    info!("Background sync triggered");
    Ok(())
  }
}

impl<S, N, P, C> WorkerHandler for Worker<S, N, P, C>
where
  S: CacheStorage + 'static,
  N: Network,
  P: NotificationSink,
  C: Clients,
{
  async fn on_install(&self, scope: &EventScope) -> Result<()> {
    self.interceptor.install(scope).await
  }

  async fn on_activate(&self, _scope: &EventScope) -> Result<()> {
    self.interceptor.activate().await
  }

  async fn on_fetch(&self, scope: &EventScope, request: &Request) -> Result<FetchReply> {
    self.interceptor.handle_fetch(scope, request).await
  }

  async fn on_push(&self, scope: &EventScope, payload: Option<&[u8]>) -> Result<()> {
    let notification = Notification::from_payload(payload);
    let sink = Arc::clone(&self.notifications);
    scope.wait_until(async move {
      if let Err(e) = sink.show(notification).await {
        warn!("Failed to display notification: {}", e);
      }
    });

    Ok(())
  }

  async fn on_notification_click(
    &self,
    scope: &EventScope,
    notification: &Notification,
  ) -> Result<()> {
    self.notifications.dismiss(&notification.tag).await?;

    let clients = Arc::clone(&self.clients);
    let origin = self.origin.clone();
    scope.wait_until(async move {
      if let Err(e) = focus_or_open(clients.as_ref(), &origin).await {
        warn!("Notification click handling failed: {}", e);
      }
    });

    Ok(())
  }

  async fn on_sync(&self, _scope: &EventScope, tag: &str) -> Result<()> {
    if tag == SYNC_TAG {
      self.sync_offline_data().await?;
    }

    Ok(())
  }
}

/// Focus the first window on the app origin, or open a fresh one at
/// the root.
async fn focus_or_open<C: Clients>(clients: &C, origin: &str) -> Result<()> {
  let app_origin = Url::parse(origin).ok().map(|u| u.origin());

  for client in clients.window_clients().await? {
    let same_origin = match (&app_origin, Url::parse(&client.url).ok()) {
      (Some(app), Some(url)) => url.origin() == *app,
      // Substring match when either side is not a parseable URL
      _ => client.url.contains(origin),
    };

    if same_origin {
      return clients.focus(&client.id).await;
    }
  }

  clients.open_window("/").await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStorage;
  use crate::net::testing::MockNetwork;
  use std::sync::Mutex;

  #[derive(Default)]
  struct RecordingSink {
    shown: Mutex<Vec<Notification>>,
    dismissed: Mutex<Vec<String>>,
  }

  impl NotificationSink for RecordingSink {
    async fn show(&self, notification: Notification) -> Result<()> {
      self.shown.lock().unwrap().push(notification);
      Ok(())
    }

    async fn dismiss(&self, tag: &str) -> Result<()> {
      self.dismissed.lock().unwrap().push(tag.to_string());
      Ok(())
    }
  }

  #[derive(Default)]
  struct FakeClients {
    windows: Vec<WindowClient>,
    focused: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
  }

  impl Clients for FakeClients {
    async fn window_clients(&self) -> Result<Vec<WindowClient>> {
      Ok(self.windows.clone())
    }

    async fn focus(&self, id: &str) -> Result<()> {
      self.focused.lock().unwrap().push(id.to_string());
      Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<()> {
      self.opened.lock().unwrap().push(url.to_string());
      Ok(())
    }
  }

  fn worker(
    clients: FakeClients,
  ) -> Worker<MemoryStorage, MockNetwork, RecordingSink, FakeClients> {
    Worker::new(
      WorkerConfig::farmer_market().unwrap(),
      MemoryStorage::new(),
      MockNetwork::new(),
      RecordingSink::default(),
      clients,
    )
  }

  #[tokio::test]
  async fn test_push_shows_notification_as_registered_work() {
    let worker = worker(FakeClients::default());
    let scope = EventScope::new();

    worker
      .on_push(&scope, Some(br#"{"title":"Prices"}"#))
      .await
      .unwrap();
    scope.settle().await;

    let shown = worker.notifications.shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Prices");
  }

  #[tokio::test]
  async fn test_click_focuses_existing_app_window() {
    let clients = FakeClients {
      windows: vec![
        WindowClient {
          id: "w1".to_string(),
          url: "https://elsewhere.example/".to_string(),
        },
        WindowClient {
          id: "w2".to_string(),
          url: "http://localhost:8501/market".to_string(),
        },
      ],
      ..Default::default()
    };
    let worker = worker(clients);
    let scope = EventScope::new();

    let notification = Notification::from_payload(Some(br#"{"tag":"prices"}"#));
    worker
      .on_notification_click(&scope, &notification)
      .await
      .unwrap();
    scope.settle().await;

    assert_eq!(*worker.clients.focused.lock().unwrap(), vec!["w2"]);
    assert!(worker.clients.opened.lock().unwrap().is_empty());
    assert_eq!(*worker.notifications.dismissed.lock().unwrap(), vec!["prices"]);
  }

  #[tokio::test]
  async fn test_click_opens_new_window_when_none_match() {
    let worker = worker(FakeClients::default());
    let scope = EventScope::new();

    let notification = Notification::from_payload(None);
    worker
      .on_notification_click(&scope, &notification)
      .await
      .unwrap();
    scope.settle().await;

    assert_eq!(*worker.clients.opened.lock().unwrap(), vec!["/"]);
  }

  #[tokio::test]
  async fn test_sync_ignores_unknown_tags() {
    let worker = worker(FakeClients::default());
    let scope = EventScope::new();

    worker.on_sync(&scope, "sync-data").await.unwrap();
    worker.on_sync(&scope, "other-tag").await.unwrap();
  }
}
