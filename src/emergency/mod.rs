//! Emergency guidance domain: wire types and the API client.

mod client;
mod types;

pub use client::EmergencyClient;
pub use types::{
  EmergencyInstruction, EmergencyType, HelpRequest, HelpRequestCreate, HelpRequestStatus,
  SeverityLevel,
};
