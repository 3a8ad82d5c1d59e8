#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches};
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod client;
pub mod commands;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod input;
pub mod iterator;
pub mod object;
pub mod printer;
pub mod settings;
pub mod user_config;
pub mod yaml;

use cli::{Cli, Invocation};

/// Sends log events to standard error. `RUST_LOG` takes precedence over
/// `--verbose`.
fn init_logging(verbose: bool) {
  let default = if verbose { "vt_cli=debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}

/// Parses the command line and runs the selected subcommand.
///
/// # Errors
///
/// Returns an error if the subcommand fails: a missing API key, an API or
/// network error while listing a collection, or a failure writing output.
/// Objects that can't be retrieved are reported on standard error without
/// failing the run.
pub async fn run() -> Result<()> {
  let mut cmd = Cli::command();
  let matches = cmd.get_matches_mut();
  let cli = Cli::from_arg_matches(&matches)?;

  init_logging(cli.verbose);
  let invocation = Invocation::from_matches(&cmd, &matches);

  commands::dispatch(cli, invocation).await
}
