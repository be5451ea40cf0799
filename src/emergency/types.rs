//! Wire types for the emergency guidance API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emergency categories served by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum EmergencyType {
  Choking,
  Bleeding,
  AllergicReaction,
}

impl EmergencyType {
  pub const ALL: [EmergencyType; 3] = [
    EmergencyType::Choking,
    EmergencyType::Bleeding,
    EmergencyType::AllergicReaction,
  ];

  /// Wire form used in URL paths and JSON payloads.
  pub fn as_str(&self) -> &'static str {
    match self {
      EmergencyType::Choking => "choking",
      EmergencyType::Bleeding => "bleeding",
      EmergencyType::AllergicReaction => "allergic_reaction",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
  Minor,
  Moderate,
  Severe,
  Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpRequestStatus {
  Active,
  Responded,
  Resolved,
}

/// One step-by-step instruction set, read-only to this core.
///
/// `voice_instructions` is index-aligned with `steps`; a length mismatch is
/// a data-integrity defect in the upstream content source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyInstruction {
  pub id: String,
  #[serde(rename = "type")]
  pub emergency_type: EmergencyType,
  pub title: String,
  pub description: String,
  pub steps: Vec<String>,
  /// Phrasing optimized for speech synthesis
  pub voice_instructions: Vec<String>,
  pub severity: SeverityLevel,
  /// e.g. "2-3 minutes"
  pub duration_estimate: String,
  pub when_to_call_911: String,
  pub created_at: DateTime<Utc>,
}

impl EmergencyInstruction {
  /// Narration line for a step, by index.
  pub fn narration_for_step(&self, index: usize) -> Option<&str> {
    self.voice_instructions.get(index).map(String::as_str)
  }
}

/// A help request as submitted by the user. Created once, never mutated or
/// cached on this side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpRequestCreate {
  pub emergency_type: EmergencyType,
  pub location_description: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub latitude: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub longitude: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub additional_info: Option<String>,
}

/// The acknowledgement record returned by the backend on submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpRequest {
  pub id: String,
  pub emergency_type: EmergencyType,
  pub location_description: String,
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
  pub contact_phone: Option<String>,
  pub additional_info: Option<String>,
  pub status: HelpRequestStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_instruction_wire_format() {
    let json = serde_json::json!({
      "id": "3f6b3f2a",
      "type": "allergic_reaction",
      "title": "Severe Allergic Reaction (Anaphylaxis)",
      "description": "Life-threatening allergic reaction with breathing problems",
      "steps": ["Call 911 immediately", "Use epinephrine auto-injector (EpiPen) if available"],
      "voice_instructions": ["Call nine one one right now", "If there's an EpiPen, use it on the outer thigh"],
      "severity": "critical",
      "duration_estimate": "Immediate action required",
      "when_to_call_911": "Immediately for severe allergic reactions",
      "created_at": "2024-05-01T12:00:00Z"
    });

    let instruction: EmergencyInstruction = serde_json::from_value(json).unwrap();
    assert_eq!(instruction.emergency_type, EmergencyType::AllergicReaction);
    assert_eq!(instruction.severity, SeverityLevel::Critical);
    assert_eq!(instruction.steps.len(), instruction.voice_instructions.len());
    assert_eq!(
      instruction.narration_for_step(0),
      Some("Call nine one one right now")
    );
    assert_eq!(instruction.narration_for_step(9), None);
  }

  #[test]
  fn test_help_request_omits_absent_optionals() {
    let create = HelpRequestCreate {
      emergency_type: EmergencyType::Bleeding,
      location_description: "Main St playground".to_string(),
      latitude: None,
      longitude: None,
      contact_phone: None,
      additional_info: None,
    };

    let value = serde_json::to_value(&create).unwrap();
    assert_eq!(
      value,
      serde_json::json!({
        "emergency_type": "bleeding",
        "location_description": "Main St playground"
      })
    );
  }

  #[test]
  fn test_category_wire_names() {
    assert_eq!(EmergencyType::AllergicReaction.as_str(), "allergic_reaction");
    assert_eq!(
      serde_json::to_value(EmergencyType::Choking).unwrap(),
      serde_json::json!("choking")
    );
  }
}
