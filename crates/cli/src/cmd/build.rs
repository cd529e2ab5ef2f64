//! Implementation of the `kiln build` command.
//!
//! Runs every bootstrap phase once and writes the generated artifacts.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use kiln_lib::bootstrap;
use kiln_lib::consts::LAST_PHASE;

use crate::output::{format_duration, print_stat, print_success};

pub fn cmd_build(dir: &Path) -> Result<()> {
  let (context, config) = super::load_project(dir)?;
  let out_dir = context.join(&config.temp_dir);

  let rt = super::runtime()?;
  let started = Instant::now();
  let app = rt
    .block_on(bootstrap(&context, config, LAST_PHASE))
    .context("Build failed")?;

  print_success(&format!("Build finished in {}", format_duration(started.elapsed())));
  for timing in app.timings() {
    print_stat(timing.phase, &format_duration(timing.elapsed));
  }
  println!();
  print_stat("Pages", &app.routes().map(|routes| routes.len()).unwrap_or_default().to_string());
  print_stat(
    "Queued assets",
    &app.queue().map(|queue| queue.len()).unwrap_or_default().to_string(),
  );
  print_stat("Output", &out_dir.display().to_string());

  info!(path = %out_dir.display(), "artifacts written");
  Ok(())
}
