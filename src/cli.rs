use clap::parser::ValueSource;
use clap::{ArgMatches, Args, Command, Parser, Subcommand};
use std::collections::BTreeMap;

use crate::client::ObjectType;

#[derive(Parser, Debug, Clone)]
#[command(
  name = "vt",
  author = "Luis Cardoso <luis@luiscardoso.dev>",
  version
)]
#[command(
  about = "Query VirusTotal for files, URLs, domains and IP addresses.",
  long_about = "A command-line client for the VirusTotal API. Retrieves files, URLs, domains, IP addresses and their relationships, and prints them as colorized YAML that can be narrowed down with --include/--exclude patterns."
)]
pub struct Cli {
  /// API key. Overrides the `VTCLI_APIKEY` environment variable and the
  /// config file.
  #[arg(
    short = 'k',
    long,
    global = true,
    env = "VTCLI_APIKEY",
    hide_env_values = true
  )]
  pub apikey: Option<String>,

  /// API host name.
  #[arg(long, global = true, hide = true, env = "VTCLI_HOST")]
  pub host: Option<String>,

  /// Verbose output.
  #[arg(short, long, global = true)]
  pub verbose: bool,

  /// Output plain, uncolored YAML.
  #[arg(short, long, global = true)]
  pub yaml: bool,

  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
  /// Get information about files, by MD5, SHA-1 or SHA-256.
  File(ObjectArgs),
  /// Get information about URLs.
  Url(ObjectArgs),
  /// Get information about Internet domains.
  Domain(ObjectArgs),
  /// Get information about IP addresses.
  Ip(ObjectArgs),
  /// Get information about file or URL analyses.
  Analysis(ObjectArgs),
  /// Search for files using VirusTotal Intelligence.
  Search(SearchArgs),
  /// List the objects related to an object.
  Related(RelatedArgs),
  /// Store the API key in the config file.
  Init(InitArgs),
  /// Print the merged configuration.
  Config,
}

/// Flags controlling how objects are displayed.
#[derive(Args, Debug, Clone, Default)]
pub struct DisplayArgs {
  /// Include fields matching the provided pattern [default: **].
  #[arg(short, long, value_delimiter = ',')]
  pub include: Option<Vec<String>>,

  /// Exclude fields matching the provided pattern.
  #[arg(short = 'x', long, value_delimiter = ',')]
  pub exclude: Option<Vec<String>>,

  /// Print identifiers only.
  #[arg(short = 'I', long)]
  pub identifiers_only: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ObjectArgs {
  /// Identifiers to look up, or `-` to read them from standard input.
  #[arg(required = true, value_name = "ID")]
  pub ids: Vec<String>,

  /// Number of threads working in parallel [default: 5].
  #[arg(short, long, env = "VTCLI_THREADS")]
  pub threads: Option<usize>,

  /// Relationships to retrieve along with each object.
  #[arg(short, long, value_delimiter = ',')]
  pub relationships: Vec<String>,

  #[command(flatten)]
  pub display: DisplayArgs,
}

/// Flags for commands listing a paginated collection.
#[derive(Args, Debug, Clone)]
pub struct CollectionArgs {
  /// Maximum number of results.
  #[arg(short = 'n', long, default_value_t = 10)]
  pub limit: usize,

  /// Cursor returned by a previous invocation.
  #[arg(short, long, default_value = "")]
  pub cursor: String,

  /// Filter.
  #[arg(short, long, default_value = "")]
  pub filter: String,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
  /// Search query.
  pub query: String,

  #[command(flatten)]
  pub collection: CollectionArgs,

  #[command(flatten)]
  pub display: DisplayArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RelatedArgs {
  /// Type of the object owning the relationship.
  #[arg(value_enum)]
  pub object_type: ObjectType,

  /// Identifier of the object.
  pub id: String,

  /// Relationship name, e.g. `contacted_ips`.
  pub relationship: String,

  #[command(flatten)]
  pub collection: CollectionArgs,

  #[command(flatten)]
  pub display: DisplayArgs,
}

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
  /// API key to store. Read from standard input when omitted.
  #[arg(value_name = "API_KEY")]
  pub key: Option<String>,
}

/// The command line as the user typed it: command path, positional
/// arguments and the flags set explicitly on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
  pub command_path: String,
  pub args: Vec<String>,
  /// Long flag name to value, sorted by name.
  pub flags: BTreeMap<String, String>,
}

impl Invocation {
  /// Rebuilds the invocation from parsed matches. Flags coming from the
  /// environment or from defaults are left out.
  #[must_use]
  pub fn from_matches(cmd: &Command, matches: &ArgMatches) -> Self {
    let mut path = vec![cmd.get_name().to_string()];
    let mut inv = Self::default();
    let (mut cmd, mut matches) = (cmd, matches);

    loop {
      for arg in cmd.get_arguments() {
        let id = arg.get_id().as_str();
        if matches.value_source(id) != Some(ValueSource::CommandLine) {
          continue;
        }
        let values: Vec<String> = matches
          .get_raw(id)
          .map(|raw| raw.map(|v| v.to_string_lossy().into_owned()).collect())
          .unwrap_or_default();
        if arg.is_positional() {
          inv.args.extend(values);
        } else if let Some(long) = arg.get_long() {
          inv.flags.insert(long.to_string(), values.join(","));
        }
      }
      let Some((name, sub_matches)) = matches.subcommand() else {
        break;
      };
      let Some(sub) = cmd.find_subcommand(name) else {
        break;
      };
      path.push(name.to_string());
      cmd = sub;
      matches = sub_matches;
    }

    inv.command_path = path.join(" ");
    inv
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  fn make_args(args: &[&str]) -> Vec<String> {
    std::iter::once("vt".to_string())
      .chain(args.iter().map(std::string::ToString::to_string))
      .collect()
  }

  fn invocation(args: &[&str]) -> Invocation {
    let mut cmd = Cli::command();
    let matches = cmd
      .try_get_matches_from_mut(make_args(args))
      .expect("Should parse");
    Invocation::from_matches(&cmd, &matches)
  }

  #[test]
  fn test_file_with_ids() {
    let cli = Cli::try_parse_from(make_args(&["file", "a", "b"]))
      .expect("Should parse file ids");
    let Commands::File(args) = cli.command else {
      panic!("expected file command");
    };
    assert_eq!(args.ids, ["a", "b"]);
    assert!(args.threads.is_none());
    assert!(args.display.include.is_none());
    assert!(args.display.exclude.is_none());
    assert!(!args.display.identifiers_only);
  }

  #[test]
  fn test_object_ids_required() {
    let result = Cli::try_parse_from(make_args(&["domain"]));
    assert!(matches!(
      result.unwrap_err().kind(),
      clap::error::ErrorKind::MissingRequiredArgument
    ));
  }

  #[test]
  fn test_include_exclude_split_on_commas() {
    let cli = Cli::try_parse_from(make_args(&[
      "ip",
      "8.8.8.8",
      "-i",
      "last_*,tags",
      "--exclude",
      "**.result",
      "-I",
      "-t",
      "2",
    ]))
    .expect("Should parse display flags");
    let Commands::Ip(args) = cli.command else {
      panic!("expected ip command");
    };
    assert_eq!(
      args.display.include.as_deref(),
      Some(&["last_*".to_string(), "tags".to_string()][..])
    );
    assert_eq!(
      args.display.exclude.as_deref(),
      Some(&["**.result".to_string()][..])
    );
    assert!(args.display.identifiers_only);
    assert_eq!(args.threads, Some(2));
  }

  #[test]
  fn test_search_defaults() {
    let cli = Cli::try_parse_from(make_args(&["search", "type:peexe"]))
      .expect("Should parse search");
    let Commands::Search(args) = cli.command else {
      panic!("expected search command");
    };
    assert_eq!(args.query, "type:peexe");
    assert_eq!(args.collection.limit, 10);
    assert_eq!(args.collection.cursor, "");
    assert_eq!(args.collection.filter, "");
  }

  #[test]
  fn test_related_object_type() {
    let cli = Cli::try_parse_from(make_args(&[
      "related",
      "ip",
      "8.8.8.8",
      "resolutions",
      "-n",
      "0",
    ]))
    .expect("Should parse related");
    let Commands::Related(args) = cli.command else {
      panic!("expected related command");
    };
    assert_eq!(args.object_type, ObjectType::IpAddress);
    assert_eq!(args.relationship, "resolutions");
    assert_eq!(args.collection.limit, 0);
  }

  #[test]
  fn test_global_flags_after_subcommand() {
    let cli =
      Cli::try_parse_from(make_args(&["url", "http://x.com", "-k", "key", "-y"]))
        .expect("Should parse global flags");
    assert_eq!(cli.apikey.as_deref(), Some("key"));
    assert!(cli.yaml);
  }

  #[test]
  fn test_invocation_keeps_explicit_flags_only() {
    let inv = invocation(&["search", "foo", "--limit=3"]);
    assert_eq!(inv.command_path, "vt search");
    assert_eq!(inv.args, ["foo"]);
    assert_eq!(inv.flags.len(), 1);
    assert_eq!(inv.flags["limit"], "3");
  }

  #[test]
  fn test_invocation_joins_list_flags() {
    let inv = invocation(&[
      "related",
      "domain",
      "x.com",
      "subdomains",
      "-i",
      "a,b",
      "--cursor",
      "C1",
      "-v",
    ]);
    assert_eq!(inv.command_path, "vt related");
    assert_eq!(inv.args, ["domain", "x.com", "subdomains"]);
    assert_eq!(inv.flags["include"], "a,b");
    assert_eq!(inv.flags["cursor"], "C1");
    assert_eq!(inv.flags["verbose"], "true");
  }
}
