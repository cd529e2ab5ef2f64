//! Code generation.
//!
//! The orchestrator only needs one operation from a generator: emit every
//! artifact, or a single named one. [`FileGenerator`] is the default and
//! writes plain artifacts into the project's temp directory:
//!
//! ```text
//! {temp_dir}/
//! ├── routes.json   # page entries
//! ├── assets.json   # queued assets
//! └── now.js        # live-reload marker, re-emitted on hot reload
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::consts::{ASSETS_ARTIFACT, LIVE_ARTIFACT, ROUTES_ARTIFACT};
use crate::routes::{RouteError, RouteTable};

/// Errors from a generation attempt (initial or incremental).
#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("failed to write {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to serialize artifact: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("route table error: {0}")]
  Routes(#[from] RouteError),

  #[error("unknown artifact: {0}")]
  UnknownTarget(String),

  /// A component needed for generation has not been created by bootstrap yet.
  #[error("{0} is not initialized")]
  NotInitialized(&'static str),
}

/// Everything a generator reads.
#[derive(Debug, Clone, Default)]
pub struct GenerateInput {
  /// Absent until routes have been created once.
  pub routes: Option<Arc<RouteTable>>,
  pub assets: Vec<PathBuf>,
}

#[async_trait]
pub trait Generator: Send + Sync {
  /// Emit all artifacts when `target` is `None`, otherwise only `target`.
  async fn generate(&self, input: &GenerateInput, target: Option<&str>) -> Result<(), GenerationError>;
}

/// Writes artifacts to a directory.
#[derive(Debug, Clone)]
pub struct FileGenerator {
  out_dir: PathBuf,
}

impl FileGenerator {
  pub fn new(out_dir: impl Into<PathBuf>) -> Self {
    Self { out_dir: out_dir.into() }
  }

  pub fn out_dir(&self) -> &Path {
    &self.out_dir
  }

  fn render(&self, input: &GenerateInput, artifact: &str) -> Result<String, GenerationError> {
    match artifact {
      ROUTES_ARTIFACT => {
        let empty = RouteTable::default();
        let table = input.routes.as_deref().unwrap_or(&empty);
        Ok(serde_json::to_string_pretty(table)?)
      }
      ASSETS_ARTIFACT => Ok(serde_json::to_string_pretty(&input.assets)?),
      LIVE_ARTIFACT => {
        let stamp = SystemTime::now()
          .duration_since(UNIX_EPOCH)
          .map(|d| d.as_millis())
          .unwrap_or_default();
        Ok(format!("export default {}\n", stamp))
      }
      other => Err(GenerationError::UnknownTarget(other.to_string())),
    }
  }

  /// Write through a temp file and rename, so readers never see a partial artifact.
  async fn write_artifact(&self, name: &str, content: &str) -> Result<(), GenerationError> {
    let io_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source| GenerationError::Io { path, source }
    };

    tokio::fs::create_dir_all(&self.out_dir)
      .await
      .map_err(io_err(&self.out_dir))?;

    let path = self.out_dir.join(name);
    let temp_path = self.out_dir.join(format!("{}.tmp", name));
    tokio::fs::write(&temp_path, content).await.map_err(io_err(&temp_path))?;
    tokio::fs::rename(&temp_path, &path).await.map_err(io_err(&path))?;

    debug!(artifact = name, path = %path.display(), "wrote artifact");
    Ok(())
  }
}

#[async_trait]
impl Generator for FileGenerator {
  async fn generate(&self, input: &GenerateInput, target: Option<&str>) -> Result<(), GenerationError> {
    let artifacts: Vec<&str> = match target {
      Some(name) => vec![name],
      None => vec![ROUTES_ARTIFACT, ASSETS_ARTIFACT, LIVE_ARTIFACT],
    };

    for artifact in artifacts {
      let content = self.render(input, artifact)?;
      self.write_artifact(artifact, &content).await?;
    }
    Ok(())
  }
}
