//! Core types for the namespaced response cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Cache partitions. Exactly two exist: one for static assets, one for
/// API responses. Each is versioned independently by a generation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
  /// Pre-seeded application shell assets (cache-first)
  StaticAssets,
  /// Emergency-data API responses (network-first)
  ApiResponses,
}

impl Namespace {
  pub const ALL: [Namespace; 2] = [Namespace::StaticAssets, Namespace::ApiResponses];

  /// Stable identifier used in the storage layer.
  pub fn as_str(&self) -> &'static str {
    match self {
      Namespace::StaticAssets => "static-assets",
      Namespace::ApiResponses => "api-responses",
    }
  }
}

/// The current generation tag for each namespace.
///
/// At most one generation per namespace is live after activation; everything
/// else is purged. Tags come from configuration and change on deploy.
#[derive(Debug, Clone)]
pub struct Generations {
  pub static_assets: String,
  pub api_responses: String,
}

impl Generations {
  pub fn current(&self, namespace: Namespace) -> &str {
    match namespace {
      Namespace::StaticAssets => &self.static_assets,
      Namespace::ApiResponses => &self.api_responses,
    }
  }
}

/// Normalized (method, URL) pair used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
  pub method: String,
  pub url: String,
}

impl RequestIdentity {
  pub fn new(method: &str, url: &str) -> Self {
    Self {
      method: method.trim().to_uppercase(),
      url: url.trim().to_string(),
    }
  }

  /// Identity for a plain GET, the only method this cache ever stores.
  pub fn get(url: &str) -> Self {
    Self::new("GET", url)
  }

  /// SHA256 hash for stable, fixed-length storage keys.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human-readable form, e.g. "GET https://example.org/api/...".
  pub fn description(&self) -> String {
    format!("{} {}", self.method, self.url)
  }
}

/// A cached HTTP response: status and headers preserved, body opaque.
///
/// Entries are immutable once written; a write for an existing identity
/// fully replaces the prior value (last-writer-wins, no merge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Where a returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Fresh data from the network
  Network,
  /// Cache hit taken before any network attempt (static strategy)
  Cache,
  /// Cache fallback after the network was unavailable or errored
  Offline,
  /// Synthetic offline terminal, no usable data anywhere
  Synthetic,
}
