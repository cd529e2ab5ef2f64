//! Events plugins send back to the application.
//!
//! Plugins never hold the application itself. They get an [`EventSender`]
//! and the application pumps the receiving end.

use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum PluginEvent {
  /// Push a message to every live client.
  Broadcast(serde_json::Value),
  /// Store content changed; rebuild routes and artifacts.
  GenerateRoutes,
}

impl PluginEvent {
  /// Map a plugin-facing event name to an event.
  pub fn from_name(name: &str, payload: serde_json::Value) -> Option<Self> {
    match name {
      "broadcast" => Some(PluginEvent::Broadcast(payload)),
      "generateRoutes" => Some(PluginEvent::GenerateRoutes),
      _ => None,
    }
  }
}

pub type EventReceiver = mpsc::UnboundedReceiver<PluginEvent>;

#[derive(Debug, Clone)]
pub struct EventSender {
  inner: mpsc::UnboundedSender<PluginEvent>,
}

impl EventSender {
  /// Send an event. Returns false once the application has gone away.
  pub fn send(&self, event: PluginEvent) -> bool {
    match self.inner.send(event) {
      Ok(()) => true,
      Err(err) => {
        warn!(event = ?err.0, "plugin event dropped, application is gone");
        false
      }
    }
  }
}

pub fn channel() -> (EventSender, EventReceiver) {
  let (inner, receiver) = mpsc::unbounded_channel();
  (EventSender { inner }, receiver)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn known_event_names() {
    assert_eq!(
      PluginEvent::from_name("broadcast", json!({ "type": "x" })),
      Some(PluginEvent::Broadcast(json!({ "type": "x" })))
    );
    assert_eq!(
      PluginEvent::from_name("generateRoutes", json!(null)),
      Some(PluginEvent::GenerateRoutes)
    );
    assert_eq!(PluginEvent::from_name("reboot", json!(null)), None);
  }

  #[tokio::test]
  async fn send_after_receiver_dropped_reports_false() {
    let (sender, mut receiver) = channel();
    assert!(sender.send(PluginEvent::GenerateRoutes));
    assert_eq!(receiver.recv().await, Some(PluginEvent::GenerateRoutes));

    drop(receiver);
    assert!(!sender.send(PluginEvent::GenerateRoutes));
  }
}
