//! Implementation of the `kiln info` command.
//!
//! Prints the resolved project configuration without running any phase.

use std::path::Path;

use anyhow::Result;

use kiln_lib::consts::{CONFIG_FILENAME, VERSION};

use crate::output::{print_info, print_item, print_stat, print_warning};

pub fn cmd_info(dir: &Path) -> Result<()> {
  let (context, config) = super::load_project(dir)?;

  print_info(&format!("kiln v{}", VERSION));
  print_stat("Project", &context.display().to_string());
  if !context.join(CONFIG_FILENAME).exists() {
    print_warning(&format!("No {} found, using defaults", CONFIG_FILENAME));
  }
  print_stat("Site", &config.site_name);
  if let Some(url) = &config.site_url {
    print_stat("URL", url);
  }
  print_stat("Output", &context.join(&config.temp_dir).display().to_string());
  print_stat("Dev server", &format!("{}:{}", config.host, config.port));

  print_stat("Plugins", &config.plugins.len().to_string());
  for plugin in &config.plugins {
    print_item(&format!("{} ({})", plugin.display_id(), plugin.path));
  }
  Ok(())
}
