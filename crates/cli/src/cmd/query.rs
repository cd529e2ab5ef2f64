//! Implementation of the `kiln query` command.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

use kiln_lib::bootstrap;
use kiln_lib::consts::SCHEMA_PHASE;

use crate::output::print_json;

/// Run one query against the project's schema and print the JSON response.
///
/// Exits non-zero when the response carries errors.
pub fn cmd_query(dir: &Path, query: &str, vars: Option<&str>) -> Result<()> {
  let variables: Map<String, Value> = match vars {
    Some(raw) => serde_json::from_str(raw).context("--vars must be a JSON object")?,
    None => Map::new(),
  };
  let (context, config) = super::load_project(dir)?;

  let rt = super::runtime()?;
  let app = rt
    .block_on(bootstrap(&context, config, SCHEMA_PHASE))
    .context("Bootstrap failed")?;

  let response = app.graphql(query, &variables);
  print_json(&response)?;

  if !response.is_ok() {
    bail!("query returned {} error(s)", response.errors.len());
  }
  Ok(())
}
