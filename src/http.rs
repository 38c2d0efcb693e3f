//! HTTP request and response types flowing through the worker.
//!
//! These are deliberately plain owned values: a stored response must be
//! duplicated to both the cache and the caller, so bodies are owned byte
//! buffers and `Clone` stands in for the platform's response clone.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// How a request was initiated by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
  /// Top-level page load (address bar, link click)
  Navigate,
  /// Subresource or API call
  #[default]
  Subresource,
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: String,
  pub url: String,
  pub headers: BTreeMap<String, String>,
  pub mode: RequestMode,
}

impl Request {
  pub fn new(method: &str, url: &str) -> Self {
    Self {
      method: method.to_uppercase(),
      url: url.to_string(),
      headers: BTreeMap::new(),
      mode: RequestMode::Subresource,
    }
  }

  /// A plain GET request.
  pub fn get(url: &str) -> Self {
    Self::new("GET", url)
  }

  /// A top-level navigation request.
  pub fn navigate(url: &str) -> Self {
    let mut request = Self::get(url);
    request.mode = RequestMode::Navigate;
    request
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.insert(name.to_lowercase(), value.to_string());
    self
  }

  /// Stable fixed-length cache key for this request.
  ///
  /// Two requests with the same method and URL map to the same stored
  /// entry; writes overwrite.
  pub fn cache_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b":");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A response, either live from the network or replayed from a cache
/// partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
  pub status: u16,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16) -> Self {
    Self {
      status,
      headers: BTreeMap::new(),
      body: Vec::new(),
    }
  }

  /// A 200 response with the given body and no headers.
  pub fn ok(body: impl Into<Vec<u8>>) -> Self {
    Self::new(200).with_body(body)
  }

  pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
    self.body = body.into();
    self
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.insert(name.to_lowercase(), value.to_string());
    self
  }

  /// Header lookup by case-insensitive name.
  pub fn header(&self, name: &str) -> Option<&str> {
    self.headers.get(&name.to_lowercase()).map(String::as_str)
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Body interpreted as UTF-8 text, lossily.
  pub fn body_text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

/// Outcome of fetch interception, handed back to the host.
#[derive(Debug, Clone)]
pub enum FetchReply {
  /// Answer the caller with this response
  Response(Response),
  /// No fallback available; the host surfaces a failed request to the
  /// calling page
  NoResponse,
}

impl FetchReply {
  pub fn is_response(&self) -> bool {
    matches!(self, FetchReply::Response(_))
  }

  pub fn into_response(self) -> Option<Response> {
    match self {
      FetchReply::Response(response) => Some(response),
      FetchReply::NoResponse => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_key_is_stable_and_method_sensitive() {
    let a = Request::get("/static/manifest.json");
    let b = Request::get("/static/manifest.json");
    let c = Request::new("POST", "/static/manifest.json");

    assert_eq!(a.cache_key(), b.cache_key());
    assert_ne!(a.cache_key(), c.cache_key());
    assert_eq!(a.cache_key().len(), 64);
  }

  #[test]
  fn test_navigation_mode() {
    assert_eq!(Request::get("/").mode, RequestMode::Subresource);
    assert_eq!(Request::navigate("/").mode, RequestMode::Navigate);
  }

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let response = Response::ok("{}").with_header("Content-Type", "application/json");
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
  }
}
