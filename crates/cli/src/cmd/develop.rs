//! Implementation of the `kiln develop` command.
//!
//! Bootstraps the site, then serves live-reload clients and queries until
//! interrupted.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use kiln_lib::bootstrap;
use kiln_lib::consts::{LAST_PHASE, LIVE_ENDPOINT};

use crate::output::{print_info, print_stat, print_success};
use crate::server;

pub fn cmd_develop(dir: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
  let (context, config) = super::load_project(dir)?;
  let host = host.unwrap_or_else(|| config.host.clone());
  let port = port.unwrap_or(config.port);

  let rt = super::runtime()?;
  rt.block_on(async move {
    let app = bootstrap(&context, config, LAST_PHASE)
      .await
      .context("Bootstrap failed")?;

    let (listener, addr) = server::bind(&host, port).await?;
    print_success(&format!("Serving at http://{}", addr));
    print_stat("Live reload", &format!("ws://{}{}", addr, LIVE_ENDPOINT));
    print_stat("Queries", &format!("http://{}/_kiln/graphql", addr));
    print_info("Press Ctrl-C to stop");

    server::serve(app, listener, shutdown_signal()).await
  })
}

/// Resolves on Ctrl-C. Without a signal handler the server runs until killed.
async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    warn!(error = %err, "failed to listen for Ctrl-C, serving until killed");
    std::future::pending::<()>().await;
  }
}
