//! Typed hook registry.
//!
//! Each hook has a fixed name ([`HookName`]), a fixed input shape
//! ([`HookInput`]) and a fixed output shape ([`HookOutput`]). Handlers are
//! kept per hook in registration order, and invocation runs them one at a
//! time in that order.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::schema::SchemaQueries;
use crate::store::ContentStore;

/// Identity of a loaded plugin, used to attribute failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginId(pub String);

impl fmt::Display for PluginId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for PluginId {
  fn from(s: &str) -> Self {
    PluginId(s.to_string())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
  Init,
  CreateSchemaQueries,
  AfterBootstrap,
}

impl HookName {
  pub const ALL: [HookName; 3] = [HookName::Init, HookName::CreateSchemaQueries, HookName::AfterBootstrap];

  pub fn as_str(&self) -> &'static str {
    match self {
      HookName::Init => "init",
      HookName::CreateSchemaQueries => "createSchemaQueries",
      HookName::AfterBootstrap => "afterBootstrap",
    }
  }
}

impl fmt::Display for HookName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for HookName {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    HookName::ALL
      .into_iter()
      .find(|hook| hook.as_str() == s)
      .ok_or_else(|| format!("unknown hook '{}'", s))
  }
}

/// Argument passed to handlers. The variant decides which hook runs.
#[derive(Debug, Clone)]
pub enum HookInput {
  Init,
  CreateSchemaQueries { store: Arc<ContentStore> },
  AfterBootstrap,
}

impl HookInput {
  pub fn name(&self) -> HookName {
    match self {
      HookInput::Init => HookName::Init,
      HookInput::CreateSchemaQueries { .. } => HookName::CreateSchemaQueries,
      HookInput::AfterBootstrap => HookName::AfterBootstrap,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum HookOutput {
  #[default]
  None,
  SchemaQueries(SchemaQueries),
}

/// A handler failed. Remaining handlers of that invocation did not run.
#[derive(Debug, Error)]
#[error("hook `{hook}` failed in plugin `{plugin}`: {cause}")]
pub struct HookError {
  pub hook: HookName,
  pub plugin: PluginId,
  #[source]
  pub cause: anyhow::Error,
}

pub type HookFuture = BoxFuture<'static, anyhow::Result<HookOutput>>;

pub trait HookHandler: Send + Sync + 'static {
  fn call(&self, input: HookInput) -> HookFuture;
}

impl<F, Fut> HookHandler for F
where
  F: Fn(HookInput) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<HookOutput>> + Send + 'static,
{
  fn call(&self, input: HookInput) -> HookFuture {
    Box::pin(self(input))
  }
}

#[derive(Clone)]
pub struct Registration {
  pub plugin: PluginId,
  pub handler: Arc<dyn HookHandler>,
}

impl fmt::Debug for Registration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registration").field("plugin", &self.plugin).finish()
  }
}

pub struct HookRegistry {
  handlers: RwLock<HashMap<HookName, Vec<Registration>>>,
  /// One gate per hook so two invocations of the same hook never interleave.
  gates: HashMap<HookName, Mutex<()>>,
}

impl Default for HookRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl HookRegistry {
  pub fn new() -> Self {
    Self {
      handlers: RwLock::new(HashMap::new()),
      gates: HookName::ALL.into_iter().map(|name| (name, Mutex::new(()))).collect(),
    }
  }

  pub fn register(&self, name: HookName, plugin: PluginId, handler: Arc<dyn HookHandler>) {
    debug!(hook = %name, plugin = %plugin, "registered hook handler");
    self
      .handlers
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(name)
      .or_default()
      .push(Registration { plugin, handler });
  }

  /// Registrations for `name`, in registration order.
  pub fn registrations(&self, name: HookName) -> Vec<Registration> {
    self
      .handlers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&name)
      .cloned()
      .unwrap_or_default()
  }

  pub fn count(&self, name: HookName) -> usize {
    self
      .handlers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&name)
      .map(Vec::len)
      .unwrap_or_default()
  }

  /// Run every handler for the input's hook, sequentially, stopping at the
  /// first failure.
  pub async fn call(&self, input: HookInput) -> Result<Vec<HookOutput>, HookError> {
    let name = input.name();
    let _gate = match self.gates.get(&name) {
      Some(gate) => Some(gate.lock().await),
      None => None,
    };

    // Handlers registered while this call runs are picked up by the next call.
    let registrations = self.registrations(name);
    let mut outputs = Vec::with_capacity(registrations.len());

    for registration in registrations {
      debug!(hook = %name, plugin = %registration.plugin, "calling hook handler");
      let output = registration
        .handler
        .call(input.clone())
        .await
        .map_err(|cause| HookError {
          hook: name,
          plugin: registration.plugin.clone(),
          cause,
        })?;
      outputs.push(output);
    }

    Ok(outputs)
  }
}
