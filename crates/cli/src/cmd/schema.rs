//! Implementation of the `kiln schema` command.

use std::path::Path;

use anyhow::{Context, Result, anyhow};

use kiln_lib::bootstrap;
use kiln_lib::consts::SCHEMA_PHASE;

use crate::output::{print_item, print_json, print_success};

/// Bootstrap through schema creation and list the root query fields.
pub fn cmd_schema(dir: &Path, json: bool) -> Result<()> {
  let (context, config) = super::load_project(dir)?;

  let rt = super::runtime()?;
  let app = rt
    .block_on(bootstrap(&context, config, SCHEMA_PHASE))
    .context("Bootstrap failed")?;
  let schema = app.schema().ok_or_else(|| anyhow!("schema was not created"))?;

  if json {
    return print_json(schema.as_ref());
  }

  print_success(&format!("{} query fields", schema.len()));
  for (name, kind) in schema.query_fields() {
    print_item(&format!("{}: {}", name, kind.type_label()));
  }
  Ok(())
}
