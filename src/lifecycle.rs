//! Explicit cache lifecycle: install, activate, refresh, resync.
//!
//! These used to be implicit platform lifecycle hooks; here they are plain
//! functions invoked by an owning process, each returning a report. Install
//! and refresh are best-effort per item: one failing asset or endpoint is
//! logged and skipped, siblings are unaffected.

use color_eyre::Result;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheStore, Generations, Namespace};
use crate::fetch::net::{Fetcher, OutboundRequest};

/// Outcome of a best-effort population pass (install or refresh).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PopulationReport {
  pub cached: usize,
  pub failed: usize,
}

/// Outcome of activation: the (namespace, generation) pairs purged.
#[derive(Debug, Default)]
pub struct ActivateReport {
  pub purged: Vec<(String, String)>,
}

/// Owns namespace generations and decides what survives.
pub struct LifecycleManager<S: CacheStore, N: Fetcher> {
  store: Arc<S>,
  net: N,
  generations: Generations,
  /// Version-pinned static asset URLs seeded at install
  static_assets: Vec<String>,
  /// Category API endpoints fetched during proactive refresh
  api_endpoints: Vec<String>,
}

impl<S: CacheStore, N: Fetcher> LifecycleManager<S, N> {
  pub fn new(
    store: Arc<S>,
    net: N,
    generations: Generations,
    static_assets: Vec<String>,
    api_endpoints: Vec<String>,
  ) -> Self {
    Self {
      store,
      net,
      generations,
      static_assets,
      api_endpoints,
    }
  }

  /// Pre-seed the static asset cache under the current generation.
  ///
  /// Assets are fetched concurrently and independently; only plain 200s
  /// are written.
  pub async fn install(&self) -> Result<PopulationReport> {
    let generation = self.generations.current(Namespace::StaticAssets);

    let outcomes = join_all(self.static_assets.iter().map(|url| async move {
      let request = OutboundRequest::get(url);
      match self.net.fetch(&request).await {
        Ok(response) if response.status == 200 => {
          self
            .store
            .put(Namespace::StaticAssets, generation, &request.identity(), &response.to_cached())?;
          Ok(true)
        }
        Ok(response) => {
          warn!(url = %url, status = response.status, "skipping asset, non-200 response");
          Ok(false)
        }
        Err(error) => {
          warn!(url = %url, error = %error, "skipping asset, fetch failed");
          Ok(false)
        }
      }
    }))
    .await;

    let report = tally(outcomes)?;
    info!(
      generation,
      cached = report.cached,
      failed = report.failed,
      "static cache installed"
    );
    Ok(report)
  }

  /// Purge every stored generation that is not current for its namespace.
  ///
  /// Post-condition: at most one live generation per namespace. Returning
  /// `Ok` is the "ready" signal; interception may begin immediately.
  pub fn activate(&self) -> Result<ActivateReport> {
    let mut report = ActivateReport::default();

    for (namespace, generation) in self.store.list_generations()? {
      let current = Namespace::ALL
        .iter()
        .find(|ns| ns.as_str() == namespace)
        .map(|ns| self.generations.current(*ns));

      // Unknown namespaces are leftovers from older layouts; purge those too.
      if current != Some(generation.as_str()) {
        let removed = self.store.delete_generation(&namespace, &generation)?;
        info!(namespace, generation, removed, "purged stale cache generation");
        report.purged.push((namespace, generation));
      }
    }

    info!(purged = report.purged.len(), "cache activated");
    Ok(report)
  }

  /// Proactively fetch and cache each emergency-data endpoint.
  ///
  /// Endpoints are fetched concurrently; one failing category does not
  /// block the others.
  pub async fn refresh(&self) -> Result<PopulationReport> {
    let generation = self.generations.current(Namespace::ApiResponses);

    let outcomes = join_all(self.api_endpoints.iter().map(|url| async move {
      let request = OutboundRequest::get(url);
      match self.net.fetch(&request).await {
        Ok(response) if response.ok() => {
          self
            .store
            .put(Namespace::ApiResponses, generation, &request.identity(), &response.to_cached())?;
          Ok(true)
        }
        Ok(response) => {
          warn!(url = %url, status = response.status, "skipping endpoint, error response");
          Ok(false)
        }
        Err(error) => {
          warn!(url = %url, error = %error, "skipping endpoint, fetch failed");
          Ok(false)
        }
      }
    }))
    .await;

    let report = tally(outcomes)?;
    info!(
      generation,
      cached = report.cached,
      failed = report.failed,
      "emergency data refreshed"
    );
    Ok(report)
  }

  /// Re-run the full proactive refresh on a background resync trigger.
  pub async fn resync(&self) -> Result<PopulationReport> {
    info!("background resync triggered");
    self.refresh().await
  }
}

/// Count population outcomes, surfacing storage errors.
fn tally(outcomes: Vec<Result<bool>>) -> Result<PopulationReport> {
  let mut report = PopulationReport::default();
  for outcome in outcomes {
    if outcome? {
      report.cached += 1;
    } else {
      report.failed += 1;
    }
  }
  Ok(report)
}
