//! Query execution against a built [`Schema`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::SiteConfig;
use crate::routes::fill_route;
use crate::store::{Collection, ContentStore, Node};

use super::query::{ArgValue, QueryDocument, Selection};
use super::{FieldKind, Schema};

/// What resolvers can see while a query runs.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
  pub store: &'a ContentStore,
  pub config: &'a SiteConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
  pub message: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub path: Vec<String>,
}

/// `{ data, errors? }`. `errors` is omitted from JSON when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
  pub data: Map<String, Value>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub errors: Vec<ResponseError>,
}

impl QueryResponse {
  /// `{ "data": {} }`
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn from_error(message: impl Into<String>) -> Self {
    Self {
      data: Map::new(),
      errors: vec![ResponseError {
        message: message.into(),
        path: Vec::new(),
      }],
    }
  }

  pub fn is_ok(&self) -> bool {
    self.errors.is_empty()
  }
}

/// Execute a parsed document.
///
/// Declared variables fall back to their default, then to `null`. Variables
/// that are supplied but not declared are still visible to arguments.
/// Unknown fields produce an error entry and a `null` value; the other fields
/// still resolve.
pub fn execute(
  schema: &Schema,
  doc: &QueryDocument,
  ctx: &QueryContext<'_>,
  variables: &Map<String, Value>,
) -> QueryResponse {
  let mut vars = variables.clone();
  for def in &doc.variables {
    if !vars.contains_key(&def.name) {
      vars.insert(def.name.clone(), def.default.clone().unwrap_or(Value::Null));
    }
  }

  let mut response = QueryResponse::empty();
  for selection in &doc.selections {
    let key = selection.response_key().to_string();
    let value = match schema.field(&selection.name) {
      Some(kind) => resolve_root(kind, selection, ctx, &vars),
      None => Err(format!("Cannot query field \"{}\" on type \"Query\"", selection.name)),
    };
    match value {
      Ok(value) => {
        response.data.insert(key, value);
      }
      Err(message) => {
        response.errors.push(ResponseError {
          message,
          path: vec![key.clone()],
        });
        response.data.insert(key, Value::Null);
      }
    }
  }
  response
}

fn resolve_root(
  kind: &FieldKind,
  selection: &Selection,
  ctx: &QueryContext<'_>,
  vars: &Map<String, Value>,
) -> Result<Value, String> {
  match kind {
    FieldKind::NodeList { type_name } => {
      let Some(collection) = ctx.store.collection(type_name) else {
        return Ok(Value::Array(Vec::new()));
      };
      let mut nodes: Vec<&Node> = collection.nodes.iter().collect();

      if let Some(Value::String(field)) = argument(selection, "sortBy", vars) {
        let descending = matches!(argument(selection, "order", vars), Some(Value::String(o)) if o.eq_ignore_ascii_case("desc"));
        nodes.sort_by(|a, b| {
          let ordering = compare_values(&a.field(&field), &b.field(&field));
          if descending { ordering.reverse() } else { ordering }
        });
      }

      let skip = usize_argument(selection, "skip", vars)?.unwrap_or(0);
      let limit = usize_argument(selection, "limit", vars)?.unwrap_or(usize::MAX);

      let items = nodes
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|node| project(&node_value(&collection, node), &selection.selections))
        .collect();
      Ok(Value::Array(items))
    }
    FieldKind::Node { type_name } => {
      let Some(collection) = ctx.store.collection(type_name) else {
        return Ok(Value::Null);
      };
      let id = argument(selection, "id", vars);
      let path = argument(selection, "path", vars);
      if id.is_none() && path.is_none() {
        return Err(format!("field \"{}\" requires an `id` or `path` argument", selection.name));
      }

      let found = collection.nodes.iter().find(|node| {
        let id_matches = id.as_ref().is_none_or(|id| id.as_str() == Some(node.id.as_str()));
        let path_matches = path.as_ref().is_none_or(|path| {
          let node_path = node_path(&collection, node);
          path.as_str().is_some_and(|p| node_path.as_deref() == Some(p))
        });
        id_matches && path_matches
      });

      Ok(
        found
          .map(|node| project(&node_value(&collection, node), &selection.selections))
          .unwrap_or(Value::Null),
      )
    }
    FieldKind::Metadata => {
      let metadata = json!({
        "siteName": ctx.config.site_name,
        "siteUrl": ctx.config.site_url,
      });
      Ok(project(&metadata, &selection.selections))
    }
    FieldKind::Extension(def) => Ok(project(&def.value, &selection.selections)),
  }
}

fn argument(selection: &Selection, name: &str, vars: &Map<String, Value>) -> Option<Value> {
  selection
    .argument(name)
    .map(|arg| arg_value(arg, vars))
    .filter(|v| !v.is_null())
}

fn arg_value(arg: &ArgValue, vars: &Map<String, Value>) -> Value {
  match arg {
    ArgValue::Variable(name) => vars.get(name).cloned().unwrap_or(Value::Null),
    ArgValue::Literal(value) => value.clone(),
    ArgValue::List(items) => Value::Array(items.iter().map(|item| arg_value(item, vars)).collect()),
  }
}

fn usize_argument(selection: &Selection, name: &str, vars: &Map<String, Value>) -> Result<Option<usize>, String> {
  match argument(selection, name, vars) {
    None => Ok(None),
    Some(value) => value
      .as_u64()
      .map(|n| Some(n as usize))
      .ok_or_else(|| format!("argument `{}` must be a non-negative integer", name)),
  }
}

fn node_path(collection: &Collection, node: &Node) -> Option<String> {
  let template = collection.options.route.as_deref()?;
  fill_route(template, node).ok()
}

fn node_value(collection: &Collection, node: &Node) -> Value {
  let mut value = node.to_json();
  if let (Some(path), Value::Object(map)) = (node_path(collection, node), &mut value) {
    map.entry("path").or_insert(Value::String(path));
  }
  value
}

/// Apply a selection set to a resolved value.
fn project(value: &Value, selections: &[Selection]) -> Value {
  if selections.is_empty() {
    return value.clone();
  }
  match value {
    Value::Object(map) => {
      let mut out = Map::new();
      for selection in selections {
        let field = map.get(&selection.name).cloned().unwrap_or(Value::Null);
        out.insert(
          selection.response_key().to_string(),
          project(&field, &selection.selections),
        );
      }
      Value::Object(out)
    }
    Value::Array(items) => Value::Array(items.iter().map(|item| project(item, selections)).collect()),
    other => other.clone(),
  }
}

fn compare_values(a: &Option<Value>, b: &Option<Value>) -> Ordering {
  match (a, b) {
    (Some(Value::Number(x)), Some(Value::Number(y))) => {
      let (x, y) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
      x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
    (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
    (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    (None, Some(_)) => Ordering::Less,
    (Some(_), None) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::{FieldDef, SchemaQueries};
  use crate::store::CollectionOptions;

  fn fixture() -> (ContentStore, SiteConfig) {
    let store = ContentStore::new();
    store.add_collection(
      "Post",
      CollectionOptions {
        route: Some("/blog/:slug".to_string()),
        ..Default::default()
      },
    );
    for (id, slug, title, rank) in [("1", "one", "One", 3), ("2", "two", "Two", 1), ("3", "three", "Three", 2)] {
      store
        .add_node(
          "Post",
          Node::new(id)
            .with_field("slug", slug)
            .with_field("title", title)
            .with_field("rank", rank),
        )
        .unwrap();
    }
    let config = SiteConfig {
      site_name: "Notes".to_string(),
      ..Default::default()
    };
    (store, config)
  }

  fn run(store: &ContentStore, config: &SiteConfig, source: &str, vars: Value) -> QueryResponse {
    let mut extensions = SchemaQueries::new();
    extensions.insert("extra".to_string(), FieldDef::new("Object", json!({ "a": 1, "b": 2 })));
    let schema = Schema::build(store, extensions);
    let doc = QueryDocument::parse(source).unwrap();
    let ctx = QueryContext { store, config };
    let vars = vars.as_object().cloned().unwrap_or_default();
    execute(&schema, &doc, &ctx, &vars)
  }

  #[test]
  fn lists_nodes_with_projection_and_path() {
    let (store, config) = fixture();
    let response = run(&store, &config, "{ allPost { id path } }", json!({}));
    assert!(response.is_ok());
    assert_eq!(
      response.data["allPost"],
      json!([
        { "id": "1", "path": "/blog/one" },
        { "id": "2", "path": "/blog/two" },
        { "id": "3", "path": "/blog/three" },
      ])
    );
  }

  #[test]
  fn sorts_and_limits() {
    let (store, config) = fixture();
    let response = run(
      &store,
      &config,
      "{ top: allPost(sortBy: \"rank\", order: DESC, limit: 2) { title } }",
      json!({}),
    );
    assert_eq!(response.data["top"], json!([{ "title": "One" }, { "title": "Three" }]));
  }

  #[test]
  fn single_node_by_path_variable() {
    let (store, config) = fixture();
    let response = run(
      &store,
      &config,
      "query ($path: String!) { post(path: $path) { title } }",
      json!({ "path": "/blog/two" }),
    );
    assert_eq!(response.data["post"], json!({ "title": "Two" }));

    let missing = run(
      &store,
      &config,
      "query ($path: String!) { post(path: $path) { title } }",
      json!({ "path": "/blog/nope" }),
    );
    assert!(missing.is_ok());
    assert_eq!(missing.data["post"], Value::Null);
  }

  #[test]
  fn single_node_requires_lookup_argument() {
    let (store, config) = fixture();
    let response = run(&store, &config, "{ post { title } }", json!({}));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].path, vec!["post".to_string()]);
  }

  #[test]
  fn metadata_and_extension_fields() {
    let (store, config) = fixture();
    let response = run(&store, &config, "{ metadata { siteName } extra { b } }", json!({}));
    assert_eq!(response.data["metadata"], json!({ "siteName": "Notes" }));
    assert_eq!(response.data["extra"], json!({ "b": 2 }));
  }

  #[test]
  fn unknown_field_is_reported_but_others_resolve() {
    let (store, config) = fixture();
    let response = run(&store, &config, "{ nope allPost { id } }", json!({}));
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.contains("nope"));
    assert_eq!(response.data["nope"], Value::Null);
    assert_eq!(response.data["allPost"].as_array().unwrap().len(), 3);
  }

  #[test]
  fn empty_response_serializes_without_errors() {
    let json = serde_json::to_value(QueryResponse::empty()).unwrap();
    assert_eq!(json, json!({ "data": {} }));
  }
}
