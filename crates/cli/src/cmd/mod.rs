mod build;
mod develop;
mod info;
mod query;
mod schema;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use kiln_lib::SiteConfig;
use kiln_lib::config::load_config;

pub use build::cmd_build;
pub use develop::cmd_develop;
pub use info::cmd_info;
pub use query::cmd_query;
pub use schema::cmd_schema;

/// Canonical project directory and its configuration.
fn load_project(dir: &Path) -> Result<(PathBuf, SiteConfig)> {
  let context =
    dunce::canonicalize(dir).with_context(|| format!("project directory not found: {}", dir.display()))?;
  let config = load_config(&context).context("failed to load configuration")?;
  Ok((context, config))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
