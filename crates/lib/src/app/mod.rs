//! The bootstrap orchestrator.
//!
//! [`App`] owns every build component and drives them through the phase
//! list:
//!
//! | # | Phase | Work |
//! |---|---|---|
//! | 0 | Initialize | store, asset queue, plugin runner, generator, event pump, `init` hook |
//! | 1 | Run plugins | load configured plugins |
//! | 2 | Create schema | `createSchemaQueries` hook, build schema |
//! | 3 | Generate code | route table, router, artifacts |
//!
//! After bootstrap the app keeps serving: plugin events, [`App::broadcast`]
//! and [`App::regenerate_routes`] may be called at any time.

pub mod phase;
pub mod regenerate;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};
use std::time::Instant;

use anyhow::anyhow;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::codegen::{FileGenerator, GenerateInput, GenerationError, Generator};
use crate::config::SiteConfig;
use crate::consts::{LIVE_ARTIFACT, VERSION};
use crate::live::{BroadcastReport, ClientRegistry};
use crate::plugins::{EventReceiver, Plugin, PluginEvent, PluginRunner, events};
use crate::routes::{Route, RouteTable, Router, create_routes};
use crate::schema::{Query, QueryContext, QueryDocument, QueryResponse, Schema, execute, merge_queries};
use crate::store::{AssetQueue, ContentStore};

pub use phase::{BootstrapError, Phase, PhaseTiming};
pub use regenerate::Regeneration;
use regenerate::RegenState;

/// Builds an [`App`] with optional in-process plugins and generator.
pub struct AppBuilder {
  context: PathBuf,
  config: SiteConfig,
  plugins: Vec<(Arc<dyn Plugin>, Value)>,
  generator: Option<Arc<dyn Generator>>,
}

impl AppBuilder {
  /// Add an in-process plugin. It is set up in phase 0, before `init` fires.
  pub fn plugin(mut self, plugin: impl Plugin + 'static, options: Value) -> Self {
    self.plugins.push((Arc::new(plugin), options));
    self
  }

  /// Replace the default [`FileGenerator`].
  pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
    self.generator = Some(generator);
    self
  }

  pub fn build(self) -> Arc<App> {
    Arc::new(App {
      context: self.context,
      config: self.config,
      native_plugins: self.plugins,
      generator_override: self.generator,
      store: OnceLock::new(),
      queue: OnceLock::new(),
      plugins: OnceLock::new(),
      generator: OnceLock::new(),
      schema: OnceLock::new(),
      router: RwLock::new(None),
      clients: Arc::new(ClientRegistry::new()),
      regen: RegenState::default(),
      generation_lock: tokio::sync::Mutex::new(()),
      timings: Mutex::new(Vec::new()),
    })
  }
}

pub struct App {
  context: PathBuf,
  config: SiteConfig,
  native_plugins: Vec<(Arc<dyn Plugin>, Value)>,
  generator_override: Option<Arc<dyn Generator>>,

  store: OnceLock<Arc<ContentStore>>,
  queue: OnceLock<Arc<AssetQueue>>,
  plugins: OnceLock<Arc<PluginRunner>>,
  generator: OnceLock<Arc<dyn Generator>>,
  schema: OnceLock<Arc<Schema>>,
  router: RwLock<Option<Arc<Router>>>,
  clients: Arc<ClientRegistry>,

  regen: RegenState,
  /// Held around every generator call.
  generation_lock: tokio::sync::Mutex<()>,
  timings: Mutex<Vec<PhaseTiming>>,
}

fn component<'a, T: ?Sized>(cell: &'a OnceLock<Arc<T>>, name: &'static str) -> Result<&'a Arc<T>, GenerationError> {
  cell.get().ok_or(GenerationError::NotInitialized(name))
}

fn set_once<T: ?Sized>(cell: &OnceLock<Arc<T>>, value: Arc<T>, name: &'static str) -> anyhow::Result<()> {
  cell
    .set(value)
    .map_err(|_| anyhow!("{} is already initialized", name))
}

impl App {
  pub fn builder(context: impl Into<PathBuf>, config: SiteConfig) -> AppBuilder {
    AppBuilder {
      context: context.into(),
      config,
      plugins: Vec::new(),
      generator: None,
    }
  }

  pub fn new(context: impl Into<PathBuf>, config: SiteConfig) -> Arc<App> {
    Self::builder(context, config).build()
  }

  pub fn default_phases() -> Vec<Phase> {
    vec![
      Phase::new("Initialize", |app: Arc<App>| async move { app.init().await }),
      Phase::new("Run plugins", |app: Arc<App>| async move { app.run_plugins().await }),
      Phase::new("Create schema", |app: Arc<App>| async move { app.create_schema().await }),
      Phase::new("Generate code", |app: Arc<App>| async move {
        app.generate_files().await?;
        Ok(())
      }),
    ]
  }

  /// Run the default phases `0..=target`, then the `afterBootstrap` hook.
  pub async fn bootstrap(self: &Arc<Self>, target: usize) -> Result<Arc<App>, BootstrapError> {
    self.bootstrap_with(&Self::default_phases(), target).await
  }

  pub async fn bootstrap_with(self: &Arc<Self>, phases: &[Phase], target: usize) -> Result<Arc<App>, BootstrapError> {
    let started = Instant::now();
    info!("kiln v{}", VERSION);

    phase::run_phases(self, phases, target).await?;

    match self.plugins.get() {
      Some(plugins) => plugins.call_after_bootstrap().await?,
      None => debug!("no plugin runner, skipping afterBootstrap"),
    }

    let elapsed = started.elapsed();
    info!(elapsed_ms = elapsed.as_millis() as u64, "Bootstrap finish - {:.2}s", elapsed.as_secs_f64());
    Ok(self.clone())
  }

  // Phases

  /// Phase 0: create components, start the event pump, call `init`.
  pub async fn init(self: &Arc<Self>) -> anyhow::Result<()> {
    let store = Arc::new(ContentStore::new());
    let queue = Arc::new(AssetQueue::new());
    let (events, receiver) = events::channel();
    let plugins = Arc::new(PluginRunner::new(
      &self.context,
      self.config.plugins.clone(),
      store.clone(),
      queue.clone(),
      events,
    ));
    let generator: Arc<dyn Generator> = match &self.generator_override {
      Some(generator) => generator.clone(),
      None => Arc::new(FileGenerator::new(self.resolve(&self.config.temp_dir))),
    };

    set_once(&self.store, store, "store")?;
    set_once(&self.queue, queue, "asset queue")?;
    set_once(&self.plugins, plugins.clone(), "plugin runner")?;
    set_once(&self.generator, generator, "generator")?;

    self.spawn_event_pump(receiver);

    for (plugin, options) in &self.native_plugins {
      plugins.install(plugin.as_ref(), options)?;
    }
    plugins.call_init().await?;
    Ok(())
  }

  /// Phase 1.
  pub async fn run_plugins(&self) -> anyhow::Result<()> {
    component(&self.plugins, "plugin runner")?.run().await?;
    Ok(())
  }

  /// Phase 2: merge `createSchemaQueries` results and build the schema.
  pub async fn create_schema(&self) -> anyhow::Result<()> {
    let store = component(&self.store, "store")?;
    let plugins = component(&self.plugins, "plugin runner")?;

    let contributions = plugins.call_create_schema_queries(store.clone()).await?;
    let schema = Schema::build(store, merge_queries(contributions));
    debug!(fields = schema.len(), "schema built");
    set_once(&self.schema, Arc::new(schema), "schema")
  }

  /// Phase 3, and the body of every regeneration: rebuild the route table and
  /// router from the live store, then emit every artifact.
  pub async fn generate_files(&self) -> Result<(), GenerationError> {
    let store = component(&self.store, "store")?;
    let _generating = self.generation_lock.lock().await;

    let table = Arc::new(create_routes(store)?);
    let router = Arc::new(Router::from_table(table.clone()));
    *self.router.write().unwrap_or_else(PoisonError::into_inner) = Some(router);
    debug!(pages = table.len(), "route table created");

    self.generate_unlocked(None).await
  }

  async fn generate(&self, target: Option<&str>) -> Result<(), GenerationError> {
    let _generating = self.generation_lock.lock().await;
    self.generate_unlocked(target).await
  }

  async fn generate_unlocked(&self, target: Option<&str>) -> Result<(), GenerationError> {
    let generator = component(&self.generator, "generator")?;
    let input = GenerateInput {
      routes: self.routes(),
      assets: component(&self.queue, "asset queue")?.pending(),
    };
    generator.generate(&input, target).await
  }

  // Live updates

  /// Send `message` as JSON to every live client. With `hot_reload`, the
  /// live artifact is regenerated afterwards; a failure there is logged.
  pub async fn broadcast<T: Serialize + Sync + ?Sized>(&self, message: &T, hot_reload: bool) -> BroadcastReport {
    let report = match serde_json::to_string(message) {
      Ok(payload) => self.clients.send_all(&payload),
      Err(err) => {
        error!(error = %err, "failed to serialize broadcast message");
        BroadcastReport::default()
      }
    };
    debug!(
      delivered = report.delivered,
      dropped = report.dropped.len(),
      hot_reload,
      "broadcast"
    );

    if hot_reload {
      if let Err(err) = self.generate(Some(LIVE_ARTIFACT)).await {
        error!(error = %err, "failed to regenerate {}", LIVE_ARTIFACT);
      }
    }
    report
  }

  /// Broadcast without hot reload.
  pub async fn notify<T: Serialize + Sync + ?Sized>(&self, message: &T) -> BroadcastReport {
    self.broadcast(message, false).await
  }

  /// Rebuild routes and artifacts from the current store.
  ///
  /// Requests overlapping a running regeneration are coalesced into one
  /// extra run of the caller already in flight. That extra run happens even
  /// when the run it overlapped failed; only the last run's error is returned.
  pub async fn regenerate_routes(&self) -> Result<Regeneration, GenerationError> {
    let Some(mut run) = self.regen.try_begin() else {
      debug!("regeneration in flight, request coalesced");
      return Ok(Regeneration::Coalesced);
    };

    let mut runs = 0;
    loop {
      runs += 1;
      let result = self.generate_files().await;
      if run.next() {
        if let Err(err) = &result {
          error!(error = %err, runs, "route regeneration failed, running again for coalesced requests");
        }
        continue;
      }
      result?;
      break;
    }
    info!(runs, "routes regenerated");
    Ok(Regeneration::Completed { runs })
  }

  fn spawn_event_pump(self: &Arc<Self>, mut receiver: EventReceiver) {
    let app: Weak<App> = Arc::downgrade(self);
    tokio::spawn(async move {
      while let Some(event) = receiver.recv().await {
        let Some(app) = app.upgrade() else {
          break;
        };
        match event {
          PluginEvent::Broadcast(message) => {
            app.broadcast(&message, true).await;
          }
          PluginEvent::GenerateRoutes => {
            tokio::spawn(async move {
              if let Err(err) = app.regenerate_routes().await {
                error!(error = %err, "route regeneration failed");
              }
            });
          }
        }
      }
      debug!("plugin event pump stopped");
    });
  }

  // Queries

  /// Execute a query against the built schema.
  ///
  /// Parse failures and a missing schema are reported in `errors`.
  pub fn graphql(&self, query: impl Into<Query>, variables: &Map<String, Value>) -> QueryResponse {
    let (Some(schema), Some(store)) = (self.schema.get(), self.store.get()) else {
      return QueryResponse::from_error("schema has not been created");
    };

    let document = match query.into() {
      Query::Document(document) => document,
      Query::Source(source) => match QueryDocument::parse(&source) {
        Ok(document) => Arc::new(document),
        Err(err) => return QueryResponse::from_error(err.to_string()),
      },
    };

    let ctx = QueryContext {
      store,
      config: &self.config,
    };
    execute(schema, &document, &ctx, variables)
  }

  /// Run the matched page's query with the route params and `path` as
  /// variables. No match, or no page query, gives `{ "data": {} }`.
  pub fn query_route_data(&self, route: &Route) -> QueryResponse {
    let Some(page) = route.matched.first() else {
      return QueryResponse::empty();
    };
    let Some(query) = &page.query else {
      return QueryResponse::empty();
    };

    let mut variables: Map<String, Value> = route
      .params
      .iter()
      .map(|(name, value)| (name.clone(), Value::String(value.clone())))
      .collect();
    variables.insert("path".to_string(), Value::String(route.path.clone()));

    self.graphql(Query::Document(query.clone()), &variables)
  }

  /// Match `path` against the current router. Before the first generation
  /// nothing matches.
  pub fn resolve_route(&self, path: &str) -> Route {
    match self.router() {
      Some(router) => router.resolve(path),
      None => Route {
        path: path.to_string(),
        params: BTreeMap::new(),
        matched: Vec::new(),
      },
    }
  }

  // Accessors

  /// Resolve `path` against the project directory.
  pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
    self.context.join(path)
  }

  pub fn context(&self) -> &Path {
    &self.context
  }

  pub fn config(&self) -> &SiteConfig {
    &self.config
  }

  pub fn store(&self) -> Option<&Arc<ContentStore>> {
    self.store.get()
  }

  pub fn queue(&self) -> Option<&Arc<AssetQueue>> {
    self.queue.get()
  }

  pub fn plugins(&self) -> Option<&Arc<PluginRunner>> {
    self.plugins.get()
  }

  pub fn schema(&self) -> Option<&Arc<Schema>> {
    self.schema.get()
  }

  pub fn router(&self) -> Option<Arc<Router>> {
    self.router.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn routes(&self) -> Option<Arc<RouteTable>> {
    self.router().map(|router| router.table().clone())
  }

  pub fn clients(&self) -> &Arc<ClientRegistry> {
    &self.clients
  }

  /// Timings of the phases completed so far.
  pub fn timings(&self) -> Vec<PhaseTiming> {
    self.timings.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  fn record_timing(&self, timing: PhaseTiming) {
    self.timings.lock().unwrap_or_else(PoisonError::into_inner).push(timing);
  }
}

impl std::fmt::Debug for App {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("App")
      .field("context", &self.context)
      .field("config", &self.config)
      .field("timings", &self.timings())
      .finish_non_exhaustive()
  }
}
