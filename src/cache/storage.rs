//! Cache store trait, SQLite and in-memory implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use super::traits::{CachedResponse, Namespace, RequestIdentity};

/// Trait for cache storage backends.
///
/// The store is the only shared mutable resource in the system. It is passed
/// explicitly into the lifecycle manager and the fetch interceptor; eviction
/// decisions happen only through `delete_generation` during activation, never
/// during request handling.
pub trait CacheStore: Send + Sync {
  /// Look up a cached response by identity within a namespace generation.
  fn get(
    &self,
    namespace: Namespace,
    generation: &str,
    identity: &RequestIdentity,
  ) -> Result<Option<CachedResponse>>;

  /// Write a response, fully replacing any prior entry for this identity.
  fn put(
    &self,
    namespace: Namespace,
    generation: &str,
    identity: &RequestIdentity,
    response: &CachedResponse,
  ) -> Result<()>;

  /// Remove a single entry. Returns whether an entry existed.
  fn delete(
    &self,
    namespace: Namespace,
    generation: &str,
    identity: &RequestIdentity,
  ) -> Result<bool>;

  /// Enumerate every (namespace, generation) pair with stored entries.
  fn list_generations(&self) -> Result<Vec<(String, String)>>;

  /// Drop all entries of one namespace generation. Returns entries removed.
  fn delete_generation(&self, namespace: &str, generation: &str) -> Result<usize>;
}

/// SQLite-based cache store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("aidcache").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for the response cache.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    namespace TEXT NOT NULL,
    generation TEXT NOT NULL,
    identity_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (namespace, generation, identity_hash)
);

CREATE INDEX IF NOT EXISTS idx_response_cache_generation
    ON response_cache(namespace, generation);
"#;

impl CacheStore for SqliteStore {
  fn get(
    &self,
    namespace: Namespace,
    generation: &str,
    identity: &RequestIdentity,
  ) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, content_type, headers, body, cached_at FROM response_cache
         WHERE namespace = ? AND generation = ? AND identity_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, Option<String>, String, Vec<u8>, String)> = stmt
      .query_row(
        params![namespace.as_str(), generation, identity.cache_hash()],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
          ))
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache entry: {}", e))?;

    match row {
      Some((status, content_type, headers_json, body, cached_at_str)) => {
        let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)
          .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;

        Ok(Some(CachedResponse {
          status,
          content_type,
          headers,
          body,
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(
    &self,
    namespace: Namespace,
    generation: &str,
    identity: &RequestIdentity,
    response: &CachedResponse,
  ) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers_json = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache
           (namespace, generation, identity_hash, method, url, status, content_type, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
          namespace.as_str(),
          generation,
          identity.cache_hash(),
          identity.method,
          identity.url,
          response.status,
          response.content_type,
          headers_json,
          response.body,
          response.cached_at.to_rfc3339(),
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn delete(
    &self,
    namespace: Namespace,
    generation: &str,
    identity: &RequestIdentity,
  ) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute(
        "DELETE FROM response_cache
         WHERE namespace = ? AND generation = ? AND identity_hash = ?",
        params![namespace.as_str(), generation, identity.cache_hash()],
      )
      .map_err(|e| eyre!("Failed to delete cache entry: {}", e))?;

    Ok(removed > 0)
  }

  fn list_generations(&self) -> Result<Vec<(String, String)>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT namespace, generation FROM response_cache ORDER BY namespace, generation")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let pairs = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
      .map_err(|e| eyre!("Failed to list generations: {}", e))?
      .collect::<std::result::Result<Vec<_>, _>>()
      .map_err(|e| eyre!("Failed to read generation row: {}", e))?;

    Ok(pairs)
  }

  fn delete_generation(&self, namespace: &str, generation: &str) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute(
        "DELETE FROM response_cache WHERE namespace = ? AND generation = ?",
        params![namespace, generation],
      )
      .map_err(|e| eyre!("Failed to delete generation: {}", e))?;

    Ok(removed)
  }
}

/// In-memory cache store for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<(String, String, String), CachedResponse>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn key(namespace: Namespace, generation: &str, identity: &RequestIdentity) -> (String, String, String) {
    (
      namespace.as_str().to_string(),
      generation.to_string(),
      identity.cache_hash(),
    )
  }
}

impl CacheStore for MemoryStore {
  fn get(
    &self,
    namespace: Namespace,
    generation: &str,
    identity: &RequestIdentity,
  ) -> Result<Option<CachedResponse>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(&Self::key(namespace, generation, identity)).cloned())
  }

  fn put(
    &self,
    namespace: Namespace,
    generation: &str,
    identity: &RequestIdentity,
    response: &CachedResponse,
  ) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(Self::key(namespace, generation, identity), response.clone());
    Ok(())
  }

  fn delete(
    &self,
    namespace: Namespace,
    generation: &str,
    identity: &RequestIdentity,
  ) -> Result<bool> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.remove(&Self::key(namespace, generation, identity)).is_some())
  }

  fn list_generations(&self) -> Result<Vec<(String, String)>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let pairs: BTreeSet<(String, String)> = entries
      .keys()
      .map(|(namespace, generation, _)| (namespace.clone(), generation.clone()))
      .collect();

    Ok(pairs.into_iter().collect())
  }

  fn delete_generation(&self, namespace: &str, generation: &str) -> Result<usize> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let before = entries.len();
    entries.retain(|(ns, gen, _), _| !(ns == namespace && gen == generation));
    Ok(before - entries.len())
  }
}

/// Parse an RFC 3339 timestamp stored by `put`.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn response(body: &[u8]) -> CachedResponse {
    CachedResponse {
      status: 200,
      content_type: Some("application/json".to_string()),
      headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
      body: body.to_vec(),
      cached_at: Utc::now(),
    }
  }

  fn roundtrip(store: &dyn CacheStore) {
    let identity = RequestIdentity::get("https://example.org/api/emergency-instructions/choking");
    let stored = response(b"[1,2,3]");

    store
      .put(Namespace::ApiResponses, "v1", &identity, &stored)
      .unwrap();

    let loaded = store
      .get(Namespace::ApiResponses, "v1", &identity)
      .unwrap()
      .expect("entry should exist");

    assert_eq!(loaded.status, 200);
    assert_eq!(loaded.body, b"[1,2,3]");
    assert_eq!(loaded.content_type.as_deref(), Some("application/json"));
    assert_eq!(
      loaded.headers.get("content-type").map(String::as_str),
      Some("application/json")
    );
  }

  #[test]
  fn test_memory_roundtrip() {
    roundtrip(&MemoryStore::new());
  }

  #[test]
  fn test_sqlite_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open_at(&dir.path().join("cache.db")).unwrap();
    roundtrip(&store);
  }

  #[test]
  fn test_put_replaces_prior_entry() {
    let store = MemoryStore::new();
    let identity = RequestIdentity::get("https://example.org/api/x");

    store
      .put(Namespace::ApiResponses, "v1", &identity, &response(b"old"))
      .unwrap();
    store
      .put(Namespace::ApiResponses, "v1", &identity, &response(b"new"))
      .unwrap();

    let loaded = store
      .get(Namespace::ApiResponses, "v1", &identity)
      .unwrap()
      .unwrap();
    assert_eq!(loaded.body, b"new");
  }

  #[test]
  fn test_generations_are_isolated() {
    let store = MemoryStore::new();
    let identity = RequestIdentity::get("https://example.org/");

    store
      .put(Namespace::StaticAssets, "v1", &identity, &response(b"one"))
      .unwrap();

    assert!(store
      .get(Namespace::StaticAssets, "v2", &identity)
      .unwrap()
      .is_none());
  }

  #[test]
  fn test_delete_generation_scoped() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open_at(&dir.path().join("cache.db")).unwrap();

    let a = RequestIdentity::get("https://example.org/a");
    let b = RequestIdentity::get("https://example.org/b");

    store
      .put(Namespace::StaticAssets, "v1", &a, &response(b"a"))
      .unwrap();
    store
      .put(Namespace::StaticAssets, "v2", &b, &response(b"b"))
      .unwrap();
    store
      .put(Namespace::ApiResponses, "v1", &a, &response(b"a"))
      .unwrap();

    let removed = store.delete_generation("static-assets", "v1").unwrap();
    assert_eq!(removed, 1);

    assert!(store.get(Namespace::StaticAssets, "v1", &a).unwrap().is_none());
    assert!(store.get(Namespace::StaticAssets, "v2", &b).unwrap().is_some());
    assert!(store.get(Namespace::ApiResponses, "v1", &a).unwrap().is_some());

    let generations = store.list_generations().unwrap();
    assert_eq!(
      generations,
      vec![
        ("api-responses".to_string(), "v1".to_string()),
        ("static-assets".to_string(), "v2".to_string()),
      ]
    );
  }

  #[test]
  fn test_delete_single_entry() {
    let store = MemoryStore::new();
    let identity = RequestIdentity::get("https://example.org/gone");

    assert!(!store.delete(Namespace::StaticAssets, "v1", &identity).unwrap());

    store
      .put(Namespace::StaticAssets, "v1", &identity, &response(b"x"))
      .unwrap();
    assert!(store.delete(Namespace::StaticAssets, "v1", &identity).unwrap());
    assert!(store.get(Namespace::StaticAssets, "v1", &identity).unwrap().is_none());
  }
}
