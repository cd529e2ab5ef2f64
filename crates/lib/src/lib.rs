//! kiln-lib: site build orchestration
//!
//! This crate drives a site build through fixed phases and keeps it live
//! afterwards:
//! - `App`: the orchestrator, bootstrapped phase by phase
//! - `PluginRunner`: loads plugins and runs their hooks in registration order
//! - `ContentStore`: collections, nodes and static pages filled by plugins
//! - `Schema`: query fields derived from the store plus plugin extensions
//! - `Router`: page paths and route patterns from the store
//! - `ClientRegistry`: live-reload clients receiving broadcasts

pub mod app;
pub mod codegen;
pub mod config;
pub mod consts;
pub mod live;
pub mod lua;
pub mod plugins;
pub mod routes;
pub mod schema;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

pub use app::{App, AppBuilder, BootstrapError, Phase, PhaseTiming, Regeneration};
pub use config::SiteConfig;

/// Create an [`App`] for `context` and bootstrap it to `target` (inclusive).
pub async fn bootstrap(
  context: impl Into<PathBuf>,
  config: SiteConfig,
  target: usize,
) -> Result<Arc<App>, BootstrapError> {
  App::new(context, config).bootstrap(target).await
}
