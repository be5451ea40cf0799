//! Signal-driven coordinator that owns the cache lifecycle.

use color_eyre::Result;
use tracing::info;

use crate::cache::CacheStore;
use crate::event::{Signal, SignalHandler};
use crate::fetch::Fetcher;
use crate::lifecycle::LifecycleManager;

/// Dispatches external triggers onto lifecycle operations. Signals are
/// handled one at a time, in arrival order.
pub struct Coordinator<S: CacheStore, N: Fetcher> {
  lifecycle: LifecycleManager<S, N>,
}

impl<S: CacheStore, N: Fetcher> Coordinator<S, N> {
  pub fn new(lifecycle: LifecycleManager<S, N>) -> Self {
    Self { lifecycle }
  }

  /// Run until the signal source closes or a `Shutdown` arrives.
  ///
  /// Network failures are absorbed per endpoint inside the lifecycle;
  /// only storage errors abort the loop.
  pub async fn run(&self, signals: &mut SignalHandler) -> Result<()> {
    while let Some(signal) = signals.next().await {
      if signal == Signal::Shutdown {
        info!("coordinator shutting down");
        break;
      }
      self.dispatch(signal).await?;
    }
    Ok(())
  }

  /// Handle a single signal.
  pub async fn dispatch(&self, signal: Signal) -> Result<()> {
    match signal {
      Signal::PopulateEmergencyData => {
        let report = self.lifecycle.refresh().await?;
        info!(
          cached = report.cached,
          failed = report.failed,
          "populate trigger handled"
        );
      }
      Signal::BackgroundResync => {
        let report = self.lifecycle.resync().await?;
        info!(
          cached = report.cached,
          failed = report.failed,
          "resync trigger handled"
        );
      }
      Signal::Shutdown => {}
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{Generations, MemoryStore, Namespace, RequestIdentity};
  use crate::fetch::net::testing::FakeFetcher;
  use std::sync::Arc;
  use tokio::sync::mpsc;

  #[tokio::test]
  async fn test_populate_signal_fills_api_cache() {
    let url = "https://guidance.example.org/api/emergency-instructions/choking";
    let net = FakeFetcher::new();
    net.json(url, &serde_json::json!([1]));

    let store = Arc::new(MemoryStore::new());
    let lifecycle = LifecycleManager::new(
      Arc::clone(&store),
      net,
      Generations {
        static_assets: "v1".to_string(),
        api_responses: "v1".to_string(),
      },
      vec![],
      vec![url.to_string()],
    );
    let coordinator = Coordinator::new(lifecycle);

    coordinator
      .dispatch(Signal::PopulateEmergencyData)
      .await
      .unwrap();

    assert!(store
      .get(Namespace::ApiResponses, "v1", &RequestIdentity::get(url))
      .unwrap()
      .is_some());
  }

  #[tokio::test]
  async fn test_run_stops_on_shutdown() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = LifecycleManager::new(
      store,
      FakeFetcher::new(),
      Generations {
        static_assets: "v1".to_string(),
        api_responses: "v1".to_string(),
      },
      vec![],
      vec![],
    );
    let coordinator = Coordinator::new(lifecycle);

    let (tx, rx) = mpsc::unbounded_channel();
    let mut signals = SignalHandler::from_channel(rx);
    tx.send(Signal::Shutdown).unwrap();

    coordinator.run(&mut signals).await.unwrap();
  }
}
