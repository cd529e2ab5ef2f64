//! Bootstrap phases.
//!
//! A phase is a titled async step over the shared [`App`]. Bootstrapping to
//! phase `n` runs phases `0..=n` in order and stops at the first failure.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::App;
use crate::plugins::HookError;

type PhaseFn = Arc<dyn Fn(Arc<App>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Clone)]
pub struct Phase {
  pub title: &'static str,
  run: PhaseFn,
}

impl Phase {
  pub fn new<F, Fut>(title: &'static str, run: F) -> Self
  where
    F: Fn(Arc<App>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    Self {
      title,
      run: Arc::new(move |app| Box::pin(run(app))),
    }
  }
}

impl fmt::Debug for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Phase").field("title", &self.title).finish()
  }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
  /// A phase failed. Phases after it did not run.
  #[error("phase `{phase}` failed: {cause:#}")]
  PhaseFailure {
    phase: &'static str,
    #[source]
    cause: anyhow::Error,
  },

  #[error("cannot bootstrap to phase {requested}: only {available} phases exist")]
  InvalidPhase { requested: usize, available: usize },

  #[error("afterBootstrap hook failed: {0}")]
  AfterBootstrap(#[from] HookError),
}

impl BootstrapError {
  /// Title of the failed phase, if a phase failed.
  pub fn phase(&self) -> Option<&'static str> {
    match self {
      BootstrapError::PhaseFailure { phase, .. } => Some(phase),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTiming {
  pub phase: &'static str,
  pub elapsed: Duration,
}

/// Run `phases[0..=target]`, recording a timing per completed phase.
pub(crate) async fn run_phases(app: &Arc<App>, phases: &[Phase], target: usize) -> Result<(), BootstrapError> {
  if target >= phases.len() {
    return Err(BootstrapError::InvalidPhase {
      requested: target,
      available: phases.len(),
    });
  }

  for phase in &phases[..=target] {
    let started = Instant::now();
    (phase.run)(app.clone())
      .await
      .map_err(|cause| BootstrapError::PhaseFailure {
        phase: phase.title,
        cause,
      })?;

    let elapsed = started.elapsed();
    info!(phase = phase.title, elapsed_ms = elapsed.as_millis() as u64, "{} - {:.2}s", phase.title, elapsed.as_secs_f64());
    app.record_timing(PhaseTiming {
      phase: phase.title,
      elapsed,
    });
  }
  Ok(())
}
