use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::Generations;
use crate::emergency::EmergencyType;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Version-pinned static asset paths pre-seeded at install
  #[serde(default = "default_static_assets")]
  pub static_assets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Origin the app is served from, e.g. "https://guidance.example.org"
  pub base_url: String,
  /// URL path prefix that marks API traffic
  #[serde(default = "default_api_prefix")]
  pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Generation tag for the static-assets namespace
  #[serde(default = "default_generation")]
  pub static_generation: String,
  /// Generation tag for the api-responses namespace
  #[serde(default = "default_generation")]
  pub api_generation: String,
  /// Path served as the offline navigation fallback
  #[serde(default = "default_root_document")]
  pub root_document: String,
  /// Override for the cache database location
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      static_generation: default_generation(),
      api_generation: default_generation(),
      root_document: default_root_document(),
      path: None,
    }
  }
}

fn default_api_prefix() -> String {
  "/api".to_string()
}

fn default_generation() -> String {
  "v1".to_string()
}

fn default_root_document() -> String {
  "/".to_string()
}

fn default_static_assets() -> Vec<String> {
  vec![
    "/".to_string(),
    "/index.html".to_string(),
    "/manifest.json".to_string(),
    "/static/js/main.js".to_string(),
    "/static/css/main.css".to_string(),
  ]
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./aidcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/aidcache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/aidcache/config.yaml\n\
                 with at least an `api.base_url` entry."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("aidcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("aidcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn base(&self) -> Result<Url> {
    Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid base_url '{}': {}", self.api.base_url, e))
  }

  /// Current generation tags for both namespaces.
  pub fn generations(&self) -> Generations {
    Generations {
      static_assets: self.cache.static_generation.clone(),
      api_responses: self.cache.api_generation.clone(),
    }
  }

  /// Absolute URLs of the pinned static assets.
  pub fn static_asset_urls(&self) -> Result<Vec<String>> {
    let base = self.base()?;
    self
      .static_assets
      .iter()
      .map(|path| {
        base
          .join(path)
          .map(String::from)
          .map_err(|e| eyre!("Invalid asset path '{}': {}", path, e))
      })
      .collect()
  }

  /// Absolute URL of the offline navigation fallback document.
  pub fn root_document_url(&self) -> Result<String> {
    let base = self.base()?;
    base
      .join(&self.cache.root_document)
      .map(String::from)
      .map_err(|e| eyre!("Invalid root document '{}': {}", self.cache.root_document, e))
  }

  /// Absolute URL of the API root, e.g. "https://host/api".
  pub fn api_root_url(&self) -> Result<String> {
    let base = self.base()?;
    let root = base
      .join(&self.api.prefix)
      .map_err(|e| eyre!("Invalid API prefix '{}': {}", self.api.prefix, e))?;
    Ok(root.as_str().trim_end_matches('/').to_string())
  }

  /// The fixed endpoint list for proactive refresh: the full instruction
  /// set plus one endpoint per category.
  pub fn api_endpoint_urls(&self) -> Result<Vec<String>> {
    let root = self.api_root_url()?;
    let mut endpoints = vec![format!("{}/emergency-instructions", root)];
    for category in EmergencyType::ALL {
      endpoints.push(format!("{}/emergency-instructions/{}", root, category.as_str()));
    }
    Ok(endpoints)
  }

  /// Location of the cache database.
  pub fn cache_path(&self) -> Result<PathBuf> {
    match &self.cache.path {
      Some(path) => Ok(path.clone()),
      None => crate::cache::SqliteStore::default_path(),
    }
  }
}
