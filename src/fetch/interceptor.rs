//! Fetch interception: per-request strategy selection and execution.
//!
//! Every outbound request is classified by its URL path. API traffic is
//! network-first with cache fallback; everything else is cache-first with
//! network populate. Each request is handled independently and one-shot:
//! no retries, no backoff, no cross-request ordering.

use color_eyre::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheStore, CachedResponse, Generations, Namespace, RequestIdentity, ResponseSource};

use super::net::{FetchedResponse, Fetcher, Method, OutboundRequest};

/// Exact body of the synthetic offline terminal. Callers must treat a 503
/// carrying this marker as "no data available", not a server-side error.
pub const OFFLINE_BODY: &str = r#"{"error":"Offline - No cached data available","offline":true}"#;

/// How a request is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  Api,
  Static,
}

/// What the interception layer hands back to the caller.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
  pub source: ResponseSource,
}

impl InterceptedResponse {
  fn from_network(response: FetchedResponse) -> Self {
    Self {
      status: response.status,
      content_type: response.content_type,
      headers: response.headers,
      body: response.body,
      source: ResponseSource::Network,
    }
  }

  fn from_cache(cached: CachedResponse, source: ResponseSource) -> Self {
    Self {
      status: cached.status,
      content_type: cached.content_type,
      headers: cached.headers,
      body: cached.body,
      source,
    }
  }

  /// The single well-defined failure terminal for the API path.
  fn synthetic_offline() -> Self {
    Self {
      status: 503,
      content_type: Some("application/json".to_string()),
      headers: BTreeMap::from([(
        "content-type".to_string(),
        "application/json".to_string(),
      )]),
      body: OFFLINE_BODY.as_bytes().to_vec(),
      source: ResponseSource::Synthetic,
    }
  }

  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Strategy layer between callers and the network, backed by the shared
/// cache store.
pub struct FetchInterceptor<S: CacheStore, N: Fetcher> {
  store: Arc<S>,
  net: N,
  /// URL path prefix that marks API traffic (e.g. "/api")
  api_prefix: String,
  /// Absolute URL of the cached root document used as navigation fallback
  root_document: String,
  generations: Generations,
}

impl<S: CacheStore, N: Fetcher> FetchInterceptor<S, N> {
  pub fn new(
    store: Arc<S>,
    net: N,
    api_prefix: String,
    root_document: String,
    generations: Generations,
  ) -> Self {
    Self {
      store,
      net,
      api_prefix,
      root_document,
      generations,
    }
  }

  #[cfg(test)]
  pub(crate) fn net(&self) -> &N {
    &self.net
  }

  /// Classify a request target by its URL path.
  pub fn classify(&self, url: &str) -> RequestClass {
    match Url::parse(url) {
      Ok(parsed) if parsed.path().starts_with(&self.api_prefix) => RequestClass::Api,
      Ok(_) => RequestClass::Static,
      Err(e) => {
        debug!(url, error = %e, "unparseable request target, treating as static");
        RequestClass::Static
      }
    }
  }

  /// Handle one outbound request end to end.
  pub async fn handle(&self, request: &OutboundRequest) -> Result<InterceptedResponse> {
    if request.method != Method::Get {
      // Only GET traffic is managed; writes go straight to the network.
      let response = self.net.fetch(request).await?;
      return Ok(InterceptedResponse::from_network(response));
    }

    match self.classify(&request.url) {
      RequestClass::Api => self.handle_api(request).await,
      RequestClass::Static => self.handle_static(request).await,
    }
  }

  /// Cache-first, network-fallback-with-populate.
  async fn handle_static(&self, request: &OutboundRequest) -> Result<InterceptedResponse> {
    let identity = request.identity();
    let generation = self.generations.current(Namespace::StaticAssets);

    if let Some(cached) = self.store.get(Namespace::StaticAssets, generation, &identity)? {
      debug!(url = %request.url, "static cache hit");
      return Ok(InterceptedResponse::from_cache(cached, ResponseSource::Cache));
    }

    match self.net.fetch(request).await {
      Ok(response) => {
        // Only plain 200s are cached; redirects and errors pass through.
        if response.status == 200 {
          self
            .store
            .put(Namespace::StaticAssets, generation, &identity, &response.to_cached())?;
        }
        Ok(InterceptedResponse::from_network(response))
      }
      Err(error) => {
        if request.navigation {
          let root = RequestIdentity::get(&self.root_document);
          if let Some(cached) = self.store.get(Namespace::StaticAssets, generation, &root)? {
            warn!(url = %request.url, "offline navigation, serving cached root document");
            return Ok(InterceptedResponse::from_cache(cached, ResponseSource::Offline));
          }
        }
        Err(error)
      }
    }
  }

  /// Network-first, cache-fallback.
  async fn handle_api(&self, request: &OutboundRequest) -> Result<InterceptedResponse> {
    let identity = request.identity();
    let generation = self.generations.current(Namespace::ApiResponses);

    match self.net.fetch(request).await {
      Ok(response) if response.ok() => {
        // Last write wins; racing requests for the same identity are
        // acceptable for idempotent reference data.
        self
          .store
          .put(Namespace::ApiResponses, generation, &identity, &response.to_cached())?;
        Ok(InterceptedResponse::from_network(response))
      }
      Ok(response) => {
        warn!(url = %request.url, status = response.status, "upstream error, trying cache");
        self.fallback(generation, &identity)
      }
      Err(error) => {
        debug!(url = %request.url, error = %error, "network unavailable, trying cache");
        self.fallback(generation, &identity)
      }
    }
  }

  /// Cached entry if present, with no status transformation; otherwise the
  /// synthetic 503 terminal.
  fn fallback(&self, generation: &str, identity: &RequestIdentity) -> Result<InterceptedResponse> {
    match self.store.get(Namespace::ApiResponses, generation, identity)? {
      Some(cached) => Ok(InterceptedResponse::from_cache(cached, ResponseSource::Offline)),
      None => Ok(InterceptedResponse::synthetic_offline()),
    }
  }
}
