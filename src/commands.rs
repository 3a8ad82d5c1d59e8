use anyhow::{bail, Context, Result};
use console::Term;
use regex::Regex;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use tracing::debug;

use crate::cli::{
  Cli, Commands, InitArgs, Invocation, ObjectArgs, RelatedArgs, SearchArgs,
};
use crate::client::{ApiClient, ObjectType};
use crate::printer::ObjectPrinter;
use crate::settings::Settings;
use crate::user_config::{self, UserConfig};
use crate::yaml::{ColorEncoder, ColorScheme};

/// Hex digests accepted by the `file` command, in any surrounding text.
const FILE_HASH_RE: &str =
  r"[[:xdigit:]]{64}|[[:xdigit:]]{40}|[[:xdigit:]]{32}";

/// Runs the subcommand selected on the command line.
pub async fn dispatch(cli: Cli, invocation: Invocation) -> Result<()> {
  let config = user_config::load();
  let settings = Settings::new(&cli, &config);

  match &cli.command {
    Commands::File(args) => {
      objects(settings, invocation, ObjectType::File, args).await
    }
    Commands::Url(args) => {
      objects(settings, invocation, ObjectType::Url, args).await
    }
    Commands::Domain(args) => {
      objects(settings, invocation, ObjectType::Domain, args).await
    }
    Commands::Ip(args) => {
      objects(settings, invocation, ObjectType::IpAddress, args).await
    }
    Commands::Analysis(args) => {
      objects(settings, invocation, ObjectType::Analysis, args).await
    }
    Commands::Search(args) => search(settings, invocation, args).await,
    Commands::Related(args) => related(settings, invocation, args).await,
    Commands::Init(args) => init(args, cli.apikey.as_deref(), config),
    Commands::Config => show_config(&settings),
  }
}

fn client(settings: &Settings) -> Result<Arc<ApiClient>> {
  Ok(Arc::new(ApiClient::new(&settings.apikey, &settings.host)?))
}

/// Regex extracting identifiers from free-form input, if the type has one.
fn arg_regex(object_type: ObjectType) -> Result<Option<Regex>> {
  match object_type {
    ObjectType::File => Ok(Some(Regex::new(FILE_HASH_RE)?)),
    _ => Ok(None),
  }
}

async fn objects(
  settings: Settings,
  invocation: Invocation,
  object_type: ObjectType,
  args: &ObjectArgs,
) -> Result<()> {
  let settings = settings.with_objects(args);
  debug!(threads = settings.threads, "retrieving objects");
  let client = client(&settings)?;
  let re = arg_regex(object_type)?;
  let mut printer = ObjectPrinter::new(client, settings, invocation)?;
  printer.print(object_type, args.ids.clone(), re).await?;
  Ok(())
}

async fn search(
  settings: Settings,
  invocation: Invocation,
  args: &SearchArgs,
) -> Result<()> {
  let settings = settings
    .with_collection(&args.collection)
    .with_display(&args.display);
  let client = client(&settings)?;
  let url =
    client.url("intelligence/search", &[("query", args.query.as_str())])?;
  let mut printer = ObjectPrinter::new(client, settings, invocation)?;
  printer
    .print_collection(url)
    .await
    .context("Search interrupted")
}

async fn related(
  settings: Settings,
  invocation: Invocation,
  args: &RelatedArgs,
) -> Result<()> {
  let settings = settings
    .with_collection(&args.collection)
    .with_display(&args.display);
  let client = client(&settings)?;
  let path = format!(
    "{}/{}",
    args.object_type.path(&args.id),
    args.relationship
  );
  let url = client.url(&path, &[])?;
  let mut printer = ObjectPrinter::new(client, settings, invocation)?;
  printer
    .print_collection(url)
    .await
    .with_context(|| format!("Listing {} interrupted", args.relationship))
}

fn read_api_key() -> Result<String> {
  let stdin = io::stdin();
  if stdin.is_terminal() {
    let term = Term::stderr();
    term.write_str("Enter your API key: ")?;
    return Ok(term.read_secure_line()?);
  }
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(line)
}

fn init(args: &InitArgs, flag: Option<&str>, config: UserConfig) -> Result<()> {
  let key = match args.key.as_deref().or(flag) {
    Some(k) => k.to_string(),
    None => read_api_key()?,
  };
  let key = key.trim();
  if key.is_empty() {
    bail!("No API key provided");
  }
  user_config::store(&UserConfig {
    apikey: Some(key.to_string()),
    ..config
  })
  .context("Failed to save the config file")?;

  let path = user_config::path()?;
  eprintln!("API key saved to {}", path.display());
  Ok(())
}

fn show_config(settings: &Settings) -> Result<()> {
  let value =
    serde_json::to_value(settings).context("Failed to serialize settings")?;
  let mut stdout = io::stdout().lock();
  let colors = ColorScheme::for_stdout(settings.yaml);
  ColorEncoder::new(&mut stdout, colors).encode(&value)?;
  stdout.flush()?;
  Ok(())
}
