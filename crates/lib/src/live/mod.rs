//! Live client registry.
//!
//! Every connected live-reload client owns the receiving end of an unbounded
//! channel; the registry keeps the sending ends. A write fails only when the
//! client's receiver is gone, and that client is then dropped.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type ClientId = String;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("failed to write to client {id}")]
pub struct ClientWriteError {
  pub id: ClientId,
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
  pub delivered: usize,
  pub dropped: Vec<ClientWriteError>,
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
  clients: Mutex<BTreeMap<ClientId, mpsc::UnboundedSender<String>>>,
}

impl ClientRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, BTreeMap<ClientId, mpsc::UnboundedSender<String>>> {
    self.clients.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register a client. Re-registering an id replaces the old channel.
  pub fn register(&self, id: impl Into<ClientId>) -> mpsc::UnboundedReceiver<String> {
    let id = id.into();
    let (sender, receiver) = mpsc::unbounded_channel();
    debug!(client = %id, "client connected");
    self.lock().insert(id, sender);
    receiver
  }

  pub fn unregister(&self, id: &str) -> bool {
    let removed = self.lock().remove(id).is_some();
    if removed {
      debug!(client = %id, "client disconnected");
    }
    removed
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn ids(&self) -> Vec<ClientId> {
    self.lock().keys().cloned().collect()
  }

  /// Write `message` to every client. Failed clients are removed; the rest
  /// still receive it.
  pub fn send_all(&self, message: &str) -> BroadcastReport {
    let mut clients = self.lock();
    let mut report = BroadcastReport::default();

    clients.retain(|id, sender| match sender.send(message.to_string()) {
      Ok(()) => {
        report.delivered += 1;
        true
      }
      Err(_) => {
        let err = ClientWriteError { id: id.clone() };
        warn!(client = %id, error = %err, "dropping live client");
        report.dropped.push(err);
        false
      }
    });

    report
  }
}
