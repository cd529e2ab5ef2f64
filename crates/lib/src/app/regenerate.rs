//! Coalescing for route regeneration.
//!
//! At most one regeneration runs at a time. A request that arrives while one
//! is running only marks the state dirty; the running one then loops once
//! more, so the last run always sees the newest store contents.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Regeneration {
  /// This call ran the regeneration, `runs` times in a row.
  Completed { runs: usize },
  /// Another call was already running and will pick this request up.
  Coalesced,
}

#[derive(Debug, Default)]
struct Flags {
  running: bool,
  pending: bool,
}

#[derive(Debug, Default)]
pub(crate) struct RegenState {
  flags: Mutex<Flags>,
}

impl RegenState {
  /// Claim the running slot, or mark the in-flight run dirty and return `None`.
  pub(crate) fn try_begin(&self) -> Option<RunGuard<'_>> {
    let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
    if flags.running {
      flags.pending = true;
      return None;
    }
    flags.running = true;
    flags.pending = false;
    Some(RunGuard {
      state: self,
      released: false,
    })
  }

  #[cfg(test)]
  fn is_running(&self) -> bool {
    self.flags.lock().unwrap_or_else(PoisonError::into_inner).running
  }
}

/// Holds the running slot. Dropping it without [`RunGuard::next`] returning
/// false (a panic or cancelled future mid-run) releases the slot; the next
/// trigger starts a fresh run.
pub(crate) struct RunGuard<'a> {
  state: &'a RegenState,
  released: bool,
}

impl RunGuard<'_> {
  /// After a run: true if another was requested meanwhile, otherwise release.
  pub(crate) fn next(&mut self) -> bool {
    let mut flags = self.state.flags.lock().unwrap_or_else(PoisonError::into_inner);
    if flags.pending {
      flags.pending = false;
      true
    } else {
      flags.running = false;
      self.released = true;
      false
    }
  }
}

impl Drop for RunGuard<'_> {
  fn drop(&mut self) {
    if !self.released {
      self.state.flags.lock().unwrap_or_else(PoisonError::into_inner).running = false;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn second_request_coalesces_into_one_more_run() {
    let state = RegenState::default();
    let mut run = state.try_begin().unwrap();

    assert!(state.try_begin().is_none());
    assert!(state.try_begin().is_none());

    assert!(run.next());
    assert!(!run.next());
    drop(run);
    assert!(!state.is_running());
    assert!(state.try_begin().is_some());
  }

  #[test]
  fn request_during_a_dropped_run_is_kept_until_the_next_run() {
    let state = RegenState::default();
    let run = state.try_begin().unwrap();
    assert!(state.try_begin().is_none());
    drop(run);

    assert!(!state.is_running());
    let mut next = state.try_begin().unwrap();
    assert!(!next.next());
  }

  #[test]
  fn dropping_mid_run_releases_slot() {
    let state = RegenState::default();
    let run = state.try_begin().unwrap();
    assert!(state.try_begin().is_none());
    drop(run);

    let mut run = state.try_begin().unwrap();
    assert!(!run.next());
  }

  #[test]
  fn release_does_not_clobber_a_later_run() {
    let state = RegenState::default();
    let mut first = state.try_begin().unwrap();
    assert!(!first.next());

    let _second = state.try_begin().unwrap();
    drop(first);
    assert!(state.is_running());
  }
}
