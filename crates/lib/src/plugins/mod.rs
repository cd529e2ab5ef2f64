//! Plugins and the hook runner.
//!
//! A plugin is anything that registers hook handlers through a
//! [`PluginApi`]. Two kinds exist:
//!
//! - native plugins implementing [`Plugin`], installed when the runner is
//!   created (before `init` fires)
//! - Lua plugins listed in `kiln.lua`, loaded by [`PluginRunner::run`]
//!
//! Plugins see the store, the asset queue and an event sender, never the
//! application itself.

pub mod events;
pub mod lua;
pub mod registry;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::PluginEntry;
use crate::schema::SchemaQueries;
use crate::store::{AssetQueue, ContentStore};

pub use events::{EventReceiver, EventSender, PluginEvent};
pub use registry::{HookError, HookHandler, HookInput, HookName, HookOutput, HookRegistry, PluginId};

#[derive(Debug, Error)]
pub enum PluginError {
  #[error("failed to set up plugin `{plugin}`: {cause:#}")]
  Setup {
    plugin: PluginId,
    #[source]
    cause: anyhow::Error,
  },
}

/// An in-process plugin.
pub trait Plugin: Send + Sync {
  fn id(&self) -> &str;

  /// Register hooks and seed content. Called once.
  fn setup(&self, api: &PluginApi, options: &serde_json::Value) -> anyhow::Result<()>;
}

/// The surface a plugin registers against.
#[derive(Debug, Clone)]
pub struct PluginApi {
  id: PluginId,
  context: PathBuf,
  registry: Weak<HookRegistry>,
  events: EventSender,
  store: Arc<ContentStore>,
  queue: Arc<AssetQueue>,
}

impl PluginApi {
  pub fn id(&self) -> &PluginId {
    &self.id
  }

  pub fn context(&self) -> &Path {
    &self.context
  }

  pub fn store(&self) -> &Arc<ContentStore> {
    &self.store
  }

  pub fn queue(&self) -> &Arc<AssetQueue> {
    &self.queue
  }

  /// Register a handler for `hook`, attributed to this plugin.
  pub fn on(&self, hook: HookName, handler: impl HookHandler) -> bool {
    self.on_shared(hook, Arc::new(handler))
  }

  /// Returns false if the runner is gone and the handler was discarded.
  pub fn on_shared(&self, hook: HookName, handler: Arc<dyn HookHandler>) -> bool {
    match self.registry.upgrade() {
      Some(registry) => {
        registry.register(hook, self.id.clone(), handler);
        true
      }
      None => false,
    }
  }

  pub fn emit(&self, event: PluginEvent) -> bool {
    debug!(plugin = %self.id, event = ?event, "plugin event");
    self.events.send(event)
  }
}

/// Owns the hook registry and loads configured plugins.
pub struct PluginRunner {
  context: PathBuf,
  entries: Vec<PluginEntry>,
  registry: Arc<HookRegistry>,
  events: EventSender,
  store: Arc<ContentStore>,
  queue: Arc<AssetQueue>,
  loaded: Mutex<Vec<PluginId>>,
}

impl PluginRunner {
  pub fn new(
    context: impl Into<PathBuf>,
    entries: Vec<PluginEntry>,
    store: Arc<ContentStore>,
    queue: Arc<AssetQueue>,
    events: EventSender,
  ) -> Self {
    Self {
      context: context.into(),
      entries,
      registry: Arc::new(HookRegistry::new()),
      events,
      store,
      queue,
      loaded: Mutex::new(Vec::new()),
    }
  }

  pub fn registry(&self) -> &Arc<HookRegistry> {
    &self.registry
  }

  /// Plugins set up so far, in setup order.
  pub fn plugins(&self) -> Vec<PluginId> {
    self.loaded.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn api(&self, id: PluginId) -> PluginApi {
    PluginApi {
      id,
      context: self.context.clone(),
      registry: Arc::downgrade(&self.registry),
      events: self.events.clone(),
      store: self.store.clone(),
      queue: self.queue.clone(),
    }
  }

  pub fn install(&self, plugin: &dyn Plugin, options: &serde_json::Value) -> Result<(), PluginError> {
    let id = PluginId(plugin.id().to_string());
    plugin
      .setup(&self.api(id.clone()), options)
      .map_err(|cause| PluginError::Setup {
        plugin: id.clone(),
        cause,
      })?;
    debug!(plugin = %id, "installed native plugin");
    self.mark_loaded(id);
    Ok(())
  }

  /// Load every configured Lua plugin, in configuration order.
  pub async fn run(&self) -> Result<(), PluginError> {
    for entry in &self.entries {
      let id = PluginId(entry.display_id());
      let path = self.resolve_entry(entry);
      lua::load_plugin(self.api(id.clone()), &path, &entry.options).map_err(|cause| PluginError::Setup {
        plugin: id.clone(),
        cause,
      })?;
      info!(plugin = %id, path = %path.display(), "loaded plugin");
      self.mark_loaded(id);
    }
    Ok(())
  }

  fn resolve_entry(&self, entry: &PluginEntry) -> PathBuf {
    let path = Path::new(&entry.path);
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.context.join(path)
    }
  }

  fn mark_loaded(&self, id: PluginId) {
    self.loaded.lock().unwrap_or_else(PoisonError::into_inner).push(id);
  }

  /// Invoke every handler of the input's hook. Fail-fast, in registration order.
  pub async fn call_hook(&self, input: HookInput) -> Result<Vec<HookOutput>, HookError> {
    self.registry.call(input).await
  }

  pub async fn call_init(&self) -> Result<(), HookError> {
    self.call_hook(HookInput::Init).await.map(|_| ())
  }

  /// One result per handler, in registration order.
  pub async fn call_create_schema_queries(&self, store: Arc<ContentStore>) -> Result<Vec<SchemaQueries>, HookError> {
    let outputs = self.call_hook(HookInput::CreateSchemaQueries { store }).await?;
    Ok(
      outputs
        .into_iter()
        .map(|output| match output {
          HookOutput::SchemaQueries(queries) => queries,
          HookOutput::None => SchemaQueries::new(),
        })
        .collect(),
    )
  }

  pub async fn call_after_bootstrap(&self) -> Result<(), HookError> {
    self.call_hook(HookInput::AfterBootstrap).await.map(|_| ())
  }
}

impl std::fmt::Debug for PluginRunner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PluginRunner")
      .field("context", &self.context)
      .field("entries", &self.entries)
      .field("plugins", &self.plugins())
      .finish()
  }
}
