//! Route table construction.
//!
//! Turns the current store contents into page entries: one per node of every
//! routed collection, plus every static page. Page queries are parsed here so
//! a malformed query fails generation instead of a later request.

pub mod router;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::schema::{QueryDocument, QueryError};
use crate::store::{ContentStore, Node};

pub use router::{Route, Router};

#[derive(Debug, Error)]
pub enum RouteError {
  #[error("route {route}: node {node} has no value for `{param}`")]
  MissingParam {
    route: String,
    param: String,
    node: String,
  },

  #[error("invalid query for page {path}: {source}")]
  Query {
    path: String,
    #[source]
    source: QueryError,
  },
}

/// Identifies the store node behind a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
  pub type_name: String,
  pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageEntry {
  /// Concrete path, e.g. `/blog/hello`.
  pub path: String,
  /// Route pattern the page was created from, e.g. `/blog/:slug`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub route: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub component: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub node: Option<NodeRef>,
  #[serde(skip)]
  pub query: Option<Arc<QueryDocument>>,
}

impl PageEntry {
  /// The pattern the router matches this page by.
  pub fn pattern(&self) -> &str {
    self.route.as_deref().unwrap_or(&self.path)
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteTable {
  pub pages: Vec<PageEntry>,
}

impl RouteTable {
  pub fn len(&self) -> usize {
    self.pages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pages.is_empty()
  }
}

/// Fill `:param` segments of a route template from node fields.
///
/// `:id` resolves to the node id. String values are inserted as-is, other
/// scalars by their JSON text.
pub fn fill_route(template: &str, node: &Node) -> Result<String, RouteError> {
  let segments = template
    .split('/')
    .map(|segment| match segment.strip_prefix(':') {
      Some(param) => match node.field(param) {
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(serde_json::Value::Null) | None => Err(RouteError::MissingParam {
          route: template.to_string(),
          param: param.to_string(),
          node: node.id.clone(),
        }),
        Some(other) => Ok(other.to_string()),
      },
      None => Ok(segment.to_string()),
    })
    .collect::<Result<Vec<_>, _>>()?;
  Ok(segments.join("/"))
}

fn parse_page_query(path: &str, source: Option<&str>) -> Result<Option<Arc<QueryDocument>>, RouteError> {
  source
    .map(|q| {
      QueryDocument::parse(q).map(Arc::new).map_err(|source| RouteError::Query {
        path: path.to_string(),
        source,
      })
    })
    .transpose()
}

/// Derive the route table from the store as it is right now.
pub fn create_routes(store: &ContentStore) -> Result<RouteTable, RouteError> {
  let mut pages = Vec::new();

  for collection in store.collections() {
    let Some(template) = collection.options.route.as_deref() else {
      continue;
    };
    let query = parse_page_query(template, collection.options.query.as_deref())?;

    for node in &collection.nodes {
      pages.push(PageEntry {
        path: fill_route(template, node)?,
        route: Some(template.to_string()),
        component: collection.options.component.clone(),
        node: Some(NodeRef {
          type_name: collection.type_name.clone(),
          id: node.id.clone(),
        }),
        query: query.clone(),
      });
    }
  }

  for page in store.pages() {
    let query = parse_page_query(&page.path, page.query.as_deref())?;
    pages.push(PageEntry {
      path: page.path,
      route: None,
      component: page.component,
      node: None,
      query,
    });
  }

  Ok(RouteTable { pages })
}
