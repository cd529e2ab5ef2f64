//! Content store.
//!
//! The authoritative data holder that plugins fill and the schema, router and
//! generator read. Collections hold typed nodes; static pages are standalone
//! routed entries. All access goes through an internal `RwLock` so the store
//! can be shared (`Arc<ContentStore>`) between plugins, the orchestrator and
//! background regeneration.

pub mod queue;

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use queue::AssetQueue;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("unknown collection: {0}")]
  UnknownCollection(String),

  #[error("invalid node for collection {collection}: {message}")]
  InvalidNode { collection: String, message: String },
}

/// A single content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: String,
  #[serde(flatten)]
  pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Node {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      fields: serde_json::Map::new(),
    }
  }

  pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
    self.fields.insert(key.into(), value.into());
    self
  }

  /// Build a node from an arbitrary JSON object with a string `id`.
  pub fn from_json(collection: &str, value: serde_json::Value) -> Result<Self, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::InvalidNode {
      collection: collection.to_string(),
      message: e.to_string(),
    })
  }

  /// Field value by name; `id` resolves to the node id.
  pub fn field(&self, name: &str) -> Option<serde_json::Value> {
    if name == "id" {
      return Some(serde_json::Value::String(self.id.clone()));
    }
    self.fields.get(name).cloned()
  }

  pub fn to_json(&self) -> serde_json::Value {
    let mut map = self.fields.clone();
    map.insert("id".to_string(), serde_json::Value::String(self.id.clone()));
    serde_json::Value::Object(map)
  }
}

/// How a collection is routed and rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionOptions {
  /// Route template such as `/blog/:slug`. Unrouted collections get no pages.
  pub route: Option<String>,
  pub component: Option<String>,
  /// Page query run for each routed node.
  pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection {
  pub type_name: String,
  #[serde(flatten)]
  pub options: CollectionOptions,
  pub nodes: Vec<Node>,
}

/// A page that is not backed by a collection node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticPage {
  pub path: String,
  #[serde(default)]
  pub component: Option<String>,
  #[serde(default)]
  pub query: Option<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
  collections: BTreeMap<String, Collection>,
  pages: Vec<StaticPage>,
}

#[derive(Debug, Default)]
pub struct ContentStore {
  inner: RwLock<StoreInner>,
}

impl ContentStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
    self.inner.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
    self.inner.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Create a collection, or update the options of an existing one.
  pub fn add_collection(&self, type_name: &str, options: CollectionOptions) {
    let mut inner = self.write();
    match inner.collections.get_mut(type_name) {
      Some(existing) => existing.options = options,
      None => {
        inner.collections.insert(
          type_name.to_string(),
          Collection {
            type_name: type_name.to_string(),
            options,
            nodes: Vec::new(),
          },
        );
      }
    }
  }

  /// Insert a node, replacing any node with the same id.
  pub fn add_node(&self, type_name: &str, node: Node) -> Result<(), StoreError> {
    let mut inner = self.write();
    let collection = inner
      .collections
      .get_mut(type_name)
      .ok_or_else(|| StoreError::UnknownCollection(type_name.to_string()))?;

    match collection.nodes.iter_mut().find(|n| n.id == node.id) {
      Some(existing) => *existing = node,
      None => collection.nodes.push(node),
    }
    Ok(())
  }

  pub fn remove_node(&self, type_name: &str, id: &str) -> Option<Node> {
    let mut inner = self.write();
    let collection = inner.collections.get_mut(type_name)?;
    let index = collection.nodes.iter().position(|n| n.id == id)?;
    Some(collection.nodes.remove(index))
  }

  /// Add a static page, replacing any page with the same path.
  pub fn add_page(&self, page: StaticPage) {
    let mut inner = self.write();
    match inner.pages.iter_mut().find(|p| p.path == page.path) {
      Some(existing) => *existing = page,
      None => inner.pages.push(page),
    }
  }

  pub fn nodes(&self, type_name: &str) -> Vec<Node> {
    self
      .read()
      .collections
      .get(type_name)
      .map(|c| c.nodes.clone())
      .unwrap_or_default()
  }

  pub fn node(&self, type_name: &str, id: &str) -> Option<Node> {
    self
      .read()
      .collections
      .get(type_name)
      .and_then(|c| c.nodes.iter().find(|n| n.id == id).cloned())
  }

  pub fn collection(&self, type_name: &str) -> Option<Collection> {
    self.read().collections.get(type_name).cloned()
  }

  /// Snapshot of every collection, sorted by type name.
  pub fn collections(&self) -> Vec<Collection> {
    self.read().collections.values().cloned().collect()
  }

  pub fn type_names(&self) -> Vec<String> {
    self.read().collections.keys().cloned().collect()
  }

  pub fn pages(&self) -> Vec<StaticPage> {
    self.read().pages.clone()
  }

  /// Node count per collection.
  pub fn counts(&self) -> BTreeMap<String, usize> {
    self
      .read()
      .collections
      .iter()
      .map(|(name, c)| (name.clone(), c.nodes.len()))
      .collect()
  }
}
