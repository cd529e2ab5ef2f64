mod cmd;
mod output;
mod server;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::print_error;

/// kiln - site build orchestrator
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Project directory
  #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
  dir: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run every phase and write the generated artifacts
  Build,

  /// Build, then serve live reload and queries
  Develop {
    /// Address to listen on (overrides the config)
    #[arg(long, env = "KILN_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides the config)
    #[arg(short, long, env = "KILN_PORT")]
    port: Option<u16>,
  },

  /// List the query fields of the schema
  Schema {
    /// Print the schema as JSON
    #[arg(long)]
    json: bool,
  },

  /// Execute a query and print the JSON response
  Query {
    /// Query text, e.g. '{ allPost { id } }'
    query: String,

    /// Variables as a JSON object
    #[arg(long)]
    vars: Option<String>,
  },

  /// Show the resolved project configuration
  Info,
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "kiln=debug,kiln_lib=debug" } else { "kiln=info,kiln_lib=info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = match cli.command {
    Commands::Build => cmd::cmd_build(&cli.dir),
    Commands::Develop { host, port } => cmd::cmd_develop(&cli.dir, host, port),
    Commands::Schema { json } => cmd::cmd_schema(&cli.dir, json),
    Commands::Query { query, vars } => cmd::cmd_query(&cli.dir, &query, vars.as_deref()),
    Commands::Info => cmd::cmd_info(&cli.dir),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}
