//! Trigger signal surface for the cache coordinator.
//!
//! The host process drives the lifecycle through plain text control lines
//! (one per line on stdin in `watch` mode). Signals carry no payload.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

/// External triggers understood by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
  /// Bare "populate emergency data" trigger: run a proactive refresh
  PopulateEmergencyData,
  /// Tagged background resync event: re-run the full refresh
  BackgroundResync,
  /// Stop the coordinator loop
  Shutdown,
}

impl Signal {
  /// Parse one control line. Unknown lines yield `None`.
  pub fn parse(line: &str) -> Option<Signal> {
    match line.trim().to_lowercase().as_str() {
      "populate" | "populate-emergency-data" => Some(Signal::PopulateEmergencyData),
      "resync" | "background-resync" => Some(Signal::BackgroundResync),
      "quit" | "exit" | "shutdown" => Some(Signal::Shutdown),
      _ => None,
    }
  }
}

/// Signal source that produces triggers from a line-oriented control stream.
pub struct SignalHandler {
  rx: mpsc::UnboundedReceiver<Signal>,
}

impl SignalHandler {
  /// Read control lines from stdin until EOF, which maps to `Shutdown`.
  pub fn from_stdin() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      let mut lines = BufReader::new(tokio::io::stdin()).lines();
      loop {
        match lines.next_line().await {
          Ok(Some(line)) => match Signal::parse(&line) {
            Some(signal) => {
              if tx.send(signal).is_err() {
                break;
              }
            }
            None => warn!(line = %line, "ignoring unknown control line"),
          },
          Ok(None) | Err(_) => {
            let _ = tx.send(Signal::Shutdown);
            break;
          }
        }
      }
    });

    Self { rx }
  }

  #[cfg(test)]
  pub(crate) fn from_channel(rx: mpsc::UnboundedReceiver<Signal>) -> Self {
    Self { rx }
  }

  /// Receive the next signal.
  pub async fn next(&mut self) -> Option<Signal> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_known_signals() {
    assert_eq!(Signal::parse("populate"), Some(Signal::PopulateEmergencyData));
    assert_eq!(
      Signal::parse("  Populate-Emergency-Data "),
      Some(Signal::PopulateEmergencyData)
    );
    assert_eq!(Signal::parse("resync"), Some(Signal::BackgroundResync));
    assert_eq!(Signal::parse("quit"), Some(Signal::Shutdown));
  }

  #[test]
  fn test_parse_rejects_unknown_lines() {
    assert_eq!(Signal::parse("refresh please"), None);
    assert_eq!(Signal::parse(""), None);
  }

  #[tokio::test]
  async fn test_handler_delivers_in_order() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut handler = SignalHandler::from_channel(rx);

    tx.send(Signal::PopulateEmergencyData).unwrap();
    tx.send(Signal::Shutdown).unwrap();
    drop(tx);

    assert_eq!(handler.next().await, Some(Signal::PopulateEmergencyData));
    assert_eq!(handler.next().await, Some(Signal::Shutdown));
    assert_eq!(handler.next().await, None);
  }
}
