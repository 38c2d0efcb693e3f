//! Push payload decoding and the notification-side collaborators.
//!
//! Presentation and window focusing live outside the caching core;
//! hosts supply [`NotificationSink`] and [`Clients`] implementations.

use color_eyre::Result;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;

const DEFAULT_TITLE: &str = "Smart Farmer Marketplace";
const DEFAULT_BODY: &str = "You have a new notification";
const DEFAULT_ICON: &str = "/static/icon-192.png";

/// Push payload fields as produced by the push backend. All optional;
/// anything missing falls back to app defaults.
#[derive(Debug, Default, Deserialize)]
struct RawPayload {
  title: Option<String>,
  body: Option<String>,
  icon: Option<String>,
  badge: Option<String>,
  data: Option<Value>,
  tag: Option<String>,
}

/// A notification ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub data: Value,
  pub tag: String,
  pub vibrate: Vec<u32>,
  pub require_interaction: bool,
}

impl Notification {
  fn base() -> Self {
    Self {
      title: DEFAULT_TITLE.to_string(),
      body: DEFAULT_BODY.to_string(),
      icon: DEFAULT_ICON.to_string(),
      badge: DEFAULT_ICON.to_string(),
      data: Value::Object(Default::default()),
      tag: "default".to_string(),
      vibrate: vec![200, 100, 200],
      require_interaction: false,
    }
  }

  /// Decode a push payload into a displayable notification.
  ///
  /// Malformed or non-JSON payloads never fail the push handler: the
  /// raw bytes become the notification body as plain text.
  pub fn from_payload(payload: Option<&[u8]>) -> Self {
    let mut notification = Self::base();

    let Some(bytes) = payload else {
      return notification;
    };

    match serde_json::from_slice::<RawPayload>(bytes) {
      Ok(raw) => {
        if let Some(title) = raw.title {
          notification.title = title;
        }
        if let Some(body) = raw.body {
          notification.body = body;
        }
        if let Some(icon) = raw.icon {
          notification.icon = icon;
        }
        if let Some(badge) = raw.badge {
          notification.badge = badge;
        }
        if let Some(data) = raw.data {
          notification.data = data;
        }
        if let Some(tag) = raw.tag {
          notification.tag = tag;
        }
      }
      Err(_) => {
        notification.body = String::from_utf8_lossy(bytes).into_owned();
      }
    }

    notification
  }
}

/// Displays and dismisses notifications on behalf of the worker.
///
/// Futures are `Send` because display runs as registered background
/// work on the event scope.
pub trait NotificationSink: Send + Sync + 'static {
  fn show(&self, notification: Notification) -> impl Future<Output = Result<()>> + Send;

  /// Dismiss a displayed notification by tag.
  fn dismiss(&self, tag: &str) -> impl Future<Output = Result<()>> + Send;
}

/// A window client known to the host browser.
#[derive(Debug, Clone)]
pub struct WindowClient {
  pub id: String,
  pub url: String,
}

/// Window enumeration and focusing, provided by the host.
pub trait Clients: Send + Sync + 'static {
  /// All open windows, controlled or not.
  fn window_clients(&self) -> impl Future<Output = Result<Vec<WindowClient>>> + Send;

  fn focus(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

  fn open_window(&self, url: &str) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_no_payload_uses_defaults() {
    let n = Notification::from_payload(None);

    assert_eq!(n.title, "Smart Farmer Marketplace");
    assert_eq!(n.body, "You have a new notification");
    assert_eq!(n.icon, "/static/icon-192.png");
    assert_eq!(n.tag, "default");
    assert_eq!(n.vibrate, vec![200, 100, 200]);
    assert!(!n.require_interaction);
  }

  #[test]
  fn test_json_payload_overrides_fields() {
    let payload = json!({
      "title": "Mandi prices updated",
      "body": "Onion up 12% in Pune",
      "tag": "prices",
      "data": { "commodity": "onion" }
    })
    .to_string();

    let n = Notification::from_payload(Some(payload.as_bytes()));

    assert_eq!(n.title, "Mandi prices updated");
    assert_eq!(n.body, "Onion up 12% in Pune");
    assert_eq!(n.tag, "prices");
    assert_eq!(n.data["commodity"], "onion");
    // Unspecified fields keep their defaults
    assert_eq!(n.icon, "/static/icon-192.png");
  }

  #[test]
  fn test_malformed_payload_becomes_body_text() {
    let n = Notification::from_payload(Some(b"rain expected tomorrow"));

    assert_eq!(n.body, "rain expected tomorrow");
    assert_eq!(n.title, "Smart Farmer Marketplace");
  }

  #[test]
  fn test_invalid_utf8_payload_is_lossy_not_fatal() {
    let n = Notification::from_payload(Some(&[0xff, 0xfe, b'h', b'i']));
    assert!(n.body.ends_with("hi"));
  }
}
