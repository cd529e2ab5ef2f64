//! Asset queue.
//!
//! Records assets (images, files) that plugins want processed. Processing
//! itself is out of scope; the generator writes the queued list to
//! `assets.json` so an external tool can pick it up.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

#[derive(Debug, Default)]
pub struct AssetQueue {
  pending: Mutex<Vec<PathBuf>>,
}

impl AssetQueue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue an asset. Returns `false` if it was already queued.
  pub fn enqueue(&self, path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    if pending.iter().any(|p| p == path) {
      return false;
    }
    debug!(asset = %path.display(), "queued asset");
    pending.push(path.to_path_buf());
    true
  }

  /// Queued assets in insertion order.
  pub fn pending(&self) -> Vec<PathBuf> {
    self.pending.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn len(&self) -> usize {
    self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn enqueue_dedupes() {
    let queue = AssetQueue::new();
    assert!(queue.is_empty());
    assert!(queue.enqueue("images/a.png"));
    assert!(queue.enqueue("images/b.png"));
    assert!(!queue.enqueue("images/a.png"));

    assert_eq!(
      queue.pending(),
      vec![PathBuf::from("images/a.png"), PathBuf::from("images/b.png")]
    );
    assert_eq!(queue.len(), 2);
  }
}
