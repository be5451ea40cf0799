//! Network access for the interception and lifecycle layers.
//!
//! The `Fetcher` trait isolates the actual HTTP transport so the strategy
//! code can be exercised against a programmable fake. `Err` from `fetch`
//! means transport-level failure only (offline, DNS, timeout); a reachable
//! server always yields `Ok`, whatever the status code.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::cache::{CachedResponse, RequestIdentity};

/// Request methods the core distinguishes. Only GET traffic is ever cached;
/// POST exists for help-request submission and passes straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
    }
  }
}

/// An outbound request as seen by the interception layer.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
  pub method: Method,
  pub url: String,
  /// JSON body for POST submissions
  pub body: Option<serde_json::Value>,
  /// Whether this is a full-page navigation (drives the offline root
  /// document fallback)
  pub navigation: bool,
}

impl OutboundRequest {
  pub fn get(url: &str) -> Self {
    Self {
      method: Method::Get,
      url: url.to_string(),
      body: None,
      navigation: false,
    }
  }

  pub fn navigation(url: &str) -> Self {
    Self {
      navigation: true,
      ..Self::get(url)
    }
  }

  pub fn post_json(url: &str, body: serde_json::Value) -> Self {
    Self {
      method: Method::Post,
      url: url.to_string(),
      body: Some(body),
      navigation: false,
    }
  }

  /// The cache key for this request.
  pub fn identity(&self) -> RequestIdentity {
    RequestIdentity::new(self.method.as_str(), &self.url)
  }
}

/// A response that made it back from the network.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

impl FetchedResponse {
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Snapshot this response as a cache entry.
  pub fn to_cached(&self) -> CachedResponse {
    CachedResponse {
      status: self.status,
      content_type: self.content_type.clone(),
      headers: self.headers.clone(),
      body: self.body.clone(),
      cached_at: Utc::now(),
    }
  }
}

/// Trait for the HTTP transport. One-shot per call: no retry, no backoff.
pub trait Fetcher: Send + Sync {
  async fn fetch(&self, request: &OutboundRequest) -> Result<FetchedResponse>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(15))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &OutboundRequest) -> Result<FetchedResponse> {
    let mut builder = match request.method {
      Method::Get => self.client.get(&request.url),
      Method::Post => self.client.post(&request.url),
    };

    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", request.url, e))?;

    let status = response.status().as_u16();

    let headers: BTreeMap<String, String> = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let content_type = headers.get("content-type").cloned();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body from {}: {}", request.url, e))?
      .to_vec();

    Ok(FetchedResponse {
      status,
      content_type,
      headers,
      body,
    })
  }
}
