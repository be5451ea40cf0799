//! Emergency guidance API client routed through the fetch interceptor.
//!
//! Instruction reads go through the interception layer so the network-first
//! strategy and offline fallback apply transparently. Help-request
//! submissions are POSTs: they pass through uncached and are one-shot; any
//! retry is a deliberate user action in the presentation layer.

use color_eyre::{eyre::eyre, Result};
use tracing::info;

use crate::cache::{CacheStore, ResponseSource};
use crate::fetch::{FetchInterceptor, Fetcher, OutboundRequest};

use super::types::{EmergencyInstruction, EmergencyType, HelpRequest, HelpRequestCreate};

/// Client for the remote emergency API, with offline support by way of the
/// interception layer.
pub struct EmergencyClient<S: CacheStore, N: Fetcher> {
  interceptor: FetchInterceptor<S, N>,
  /// Absolute URL of the API root, e.g. "https://host/api"
  api_root: String,
}

impl<S: CacheStore, N: Fetcher> EmergencyClient<S, N> {
  pub fn new(interceptor: FetchInterceptor<S, N>, api_root: String) -> Self {
    Self {
      interceptor,
      api_root: api_root.trim_end_matches('/').to_string(),
    }
  }

  /// Instruction sets for one category. Returns the records and where they
  /// came from so callers can surface offline mode.
  pub async fn instructions(
    &self,
    category: EmergencyType,
  ) -> Result<(Vec<EmergencyInstruction>, ResponseSource)> {
    self
      .fetch_instructions(&format!(
        "{}/emergency-instructions/{}",
        self.api_root,
        category.as_str()
      ))
      .await
  }

  /// Every instruction set, across all categories.
  pub async fn all_instructions(&self) -> Result<(Vec<EmergencyInstruction>, ResponseSource)> {
    self
      .fetch_instructions(&format!("{}/emergency-instructions", self.api_root))
      .await
  }

  async fn fetch_instructions(
    &self,
    url: &str,
  ) -> Result<(Vec<EmergencyInstruction>, ResponseSource)> {
    let response = self.interceptor.handle(&OutboundRequest::get(url)).await?;

    if response.source == ResponseSource::Synthetic {
      return Err(eyre!(
        "Offline and no cached instructions available for {}",
        url
      ));
    }
    if !response.ok() {
      return Err(eyre!(
        "Instruction fetch for {} failed with status {}",
        url,
        response.status
      ));
    }

    let records: Vec<EmergencyInstruction> = serde_json::from_slice(&response.body)
      .map_err(|e| eyre!("Failed to parse instructions from {}: {}", url, e))?;

    info!(url, count = records.len(), source = ?response.source, "instructions loaded");
    Ok((records, response.source))
  }

  /// Submit a community help request. Never cached, never retried here.
  pub async fn submit_help_request(&self, create: &HelpRequestCreate) -> Result<HelpRequest> {
    let url = format!("{}/help-requests", self.api_root);
    let body = serde_json::to_value(create)
      .map_err(|e| eyre!("Failed to serialize help request: {}", e))?;

    let response = self
      .interceptor
      .handle(&OutboundRequest::post_json(&url, body))
      .await
      .map_err(|e| eyre!("Help request submission failed: {}", e))?;

    if !response.ok() {
      return Err(eyre!(
        "Help request rejected with status {}",
        response.status
      ));
    }

    let ack: HelpRequest = serde_json::from_slice(&response.body)
      .map_err(|e| eyre!("Failed to parse help request acknowledgement: {}", e))?;

    info!(id = %ack.id, status = ?ack.status, "help request submitted");
    Ok(ack)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use super::super::types::HelpRequestStatus;
  use crate::cache::{Generations, MemoryStore};
  use crate::fetch::net::testing::FakeFetcher;
  use crate::fetch::Method;
  use std::sync::Arc;

  const BASE: &str = "https://guidance.example.org";

  fn client(net: FakeFetcher) -> EmergencyClient<MemoryStore, FakeFetcher> {
    let store = Arc::new(MemoryStore::new());
    let interceptor = FetchInterceptor::new(
      store,
      net,
      "/api".to_string(),
      format!("{}/", BASE),
      Generations {
        static_assets: "v1".to_string(),
        api_responses: "v1".to_string(),
      },
    );
    EmergencyClient::new(interceptor, format!("{}/api", BASE))
  }

  fn bleeding_records() -> serde_json::Value {
    serde_json::json!([{
      "id": "b1",
      "type": "bleeding",
      "title": "Severe Bleeding Control",
      "description": "For heavy bleeding from cuts or wounds",
      "steps": ["Apply direct pressure with clean cloth or bandage"],
      "voice_instructions": ["Put a clean cloth directly on the wound"],
      "severity": "severe",
      "duration_estimate": "Until medical help arrives",
      "when_to_call_911": "For any severe bleeding that won't stop",
      "created_at": "2024-05-01T12:00:00Z"
    }])
  }

  #[tokio::test]
  async fn test_online_fetch_then_offline_serves_cached() {
    let net = FakeFetcher::new();
    net.json(
      &format!("{}/api/emergency-instructions/bleeding", BASE),
      &bleeding_records(),
    );
    let client = client(net);

    let (online, source) = client.instructions(EmergencyType::Bleeding).await.unwrap();
    assert_eq!(source, ResponseSource::Network);
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].title, "Severe Bleeding Control");

    client.interceptor.net().set_offline(true);

    let (offline, source) = client.instructions(EmergencyType::Bleeding).await.unwrap();
    assert_eq!(source, ResponseSource::Offline);
    assert_eq!(offline[0].id, online[0].id);
    assert_eq!(offline[0].steps, online[0].steps);
  }

  #[tokio::test]
  async fn test_offline_without_cache_is_an_error() {
    let net = FakeFetcher::new();
    net.set_offline(true);
    let client = client(net);

    let result = client.instructions(EmergencyType::Choking).await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_submit_help_request_acknowledged() {
    let net = FakeFetcher::new();
    net.respond(
      Method::Post,
      &format!("{}/api/help-requests", BASE),
      200,
      "application/json",
      serde_json::json!({
        "id": "hr-1",
        "emergency_type": "choking",
        "location_description": "Main St cafe",
        "latitude": null,
        "longitude": null,
        "contact_phone": null,
        "additional_info": null,
        "status": "active",
        "created_at": "2024-05-01T12:00:00Z",
        "updated_at": "2024-05-01T12:00:00Z"
      })
      .to_string()
      .as_bytes(),
    );
    let client = client(net);

    let ack = client
      .submit_help_request(&HelpRequestCreate {
        emergency_type: EmergencyType::Choking,
        location_description: "Main St cafe".to_string(),
        latitude: None,
        longitude: None,
        contact_phone: None,
        additional_info: None,
      })
      .await
      .unwrap();

    assert_eq!(ack.id, "hr-1");
    assert_eq!(ack.status, HelpRequestStatus::Active);
  }

  #[tokio::test]
  async fn test_submit_fails_offline() {
    let net = FakeFetcher::new();
    net.set_offline(true);
    let client = client(net);

    let result = client
      .submit_help_request(&HelpRequestCreate {
        emergency_type: EmergencyType::Bleeding,
        location_description: "park".to_string(),
        latitude: Some(40.7),
        longitude: Some(-74.0),
        contact_phone: Some("555-0100".to_string()),
        additional_info: None,
      })
      .await;

    assert!(result.is_err());
  }
}
