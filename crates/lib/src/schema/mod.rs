//! Query schema.
//!
//! The schema lists the root query fields available to page queries and
//! [`crate::app::App::graphql`]. It is derived from the content store once per
//! bootstrap, plus whatever fields plugins contribute through the
//! `createSchemaQueries` hook.
//!
//! For each collection `Post` the schema exposes:
//! - `allPost(limit, order, sortBy)`: list of nodes
//! - `post(id, path)`: a single node
//!
//! and always `metadata { siteName siteUrl }`.

pub mod execute;
pub mod query;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::ContentStore;

pub use execute::{QueryContext, QueryResponse, ResponseError, execute};
pub use query::{ArgValue, Query, QueryDocument, QueryError, Selection};

/// A query field contributed by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
  /// Declared result type, informational.
  #[serde(rename = "type", default = "FieldDef::default_type")]
  pub type_name: String,

  #[serde(default)]
  pub description: Option<String>,

  /// Value the field resolves to.
  #[serde(default)]
  pub value: serde_json::Value,
}

impl FieldDef {
  fn default_type() -> String {
    "JSON".to_string()
  }

  pub fn new(type_name: impl Into<String>, value: serde_json::Value) -> Self {
    Self {
      type_name: type_name.into(),
      description: None,
      value,
    }
  }
}

/// Fields returned by one `createSchemaQueries` handler.
pub type SchemaQueries = BTreeMap<String, FieldDef>;

/// Shallow union of hook results; later contributions win on name clashes.
pub fn merge_queries(contributions: impl IntoIterator<Item = SchemaQueries>) -> SchemaQueries {
  let mut merged = SchemaQueries::new();
  for queries in contributions {
    merged.extend(queries);
  }
  merged
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
  /// `allType`: every node of a collection.
  NodeList { type_name: String },
  /// `type`: a single node looked up by id or path.
  Node { type_name: String },
  /// Site metadata from the config.
  Metadata,
  /// Contributed by a plugin.
  Extension(FieldDef),
}

impl FieldKind {
  pub fn type_label(&self) -> String {
    match self {
      FieldKind::NodeList { type_name } => format!("[{}]", type_name),
      FieldKind::Node { type_name } => type_name.clone(),
      FieldKind::Metadata => "Metadata".to_string(),
      FieldKind::Extension(def) => def.type_name.clone(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
  fields: BTreeMap<String, FieldKind>,
}

impl Schema {
  /// Build the schema from the store's collections plus plugin extensions.
  ///
  /// Extensions are added last, so a plugin may shadow a derived field.
  pub fn build(store: &ContentStore, extensions: SchemaQueries) -> Self {
    let mut fields = BTreeMap::new();

    for type_name in store.type_names() {
      fields.insert(
        format!("all{}", type_name),
        FieldKind::NodeList {
          type_name: type_name.clone(),
        },
      );
      fields.insert(lower_first(&type_name), FieldKind::Node { type_name });
    }

    fields.insert("metadata".to_string(), FieldKind::Metadata);

    for (name, def) in extensions {
      fields.insert(name, FieldKind::Extension(def));
    }

    Self { fields }
  }

  pub fn field(&self, name: &str) -> Option<&FieldKind> {
    self.fields.get(name)
  }

  pub fn has_query_field(&self, name: &str) -> bool {
    self.fields.contains_key(name)
  }

  pub fn query_fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
    self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }
}

fn lower_first(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_lowercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::CollectionOptions;
  use serde_json::json;

  #[test]
  fn derives_fields_per_collection() {
    let store = ContentStore::new();
    store.add_collection("BlogPost", CollectionOptions::default());

    let schema = Schema::build(&store, SchemaQueries::new());
    assert!(schema.has_query_field("allBlogPost"));
    assert!(schema.has_query_field("blogPost"));
    assert!(schema.has_query_field("metadata"));
    assert_eq!(schema.len(), 3);
    assert_eq!(schema.field("allBlogPost").unwrap().type_label(), "[BlogPost]");
  }

  #[test]
  fn extensions_are_added_and_can_shadow() {
    let store = ContentStore::new();
    let mut extra = SchemaQueries::new();
    extra.insert("extra".to_string(), FieldDef::new("String", json!("hi")));
    extra.insert("metadata".to_string(), FieldDef::new("String", json!("custom")));

    let schema = Schema::build(&store, extra);
    assert!(matches!(schema.field("extra"), Some(FieldKind::Extension(_))));
    assert!(matches!(schema.field("metadata"), Some(FieldKind::Extension(_))));
  }

  #[test]
  fn merge_is_shallow_and_last_wins() {
    let mut first = SchemaQueries::new();
    first.insert("a".to_string(), FieldDef::new("Int", json!(1)));
    first.insert("b".to_string(), FieldDef::new("Int", json!(1)));
    let mut second = SchemaQueries::new();
    second.insert("b".to_string(), FieldDef::new("Int", json!(2)));

    let merged = merge_queries([first, second]);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged["a"].value, json!(1));
    assert_eq!(merged["b"].value, json!(2));
  }

  #[test]
  fn field_def_deserializes_with_defaults() {
    let def: FieldDef = serde_json::from_value(json!({ "value": [1, 2] })).unwrap();
    assert_eq!(def.type_name, "JSON");
    assert_eq!(def.description, None);
  }

  #[test]
  fn lower_first_handles_edges() {
    assert_eq!(lower_first("Post"), "post");
    assert_eq!(lower_first(""), "");
  }
}
