//! Effective configuration for one invocation.
//!
//! Values come from the command line (including the `VTCLI_*` environment
//! variables clap reads for us), then the user config file, then built-in
//! defaults.

use serde::Serialize;

use crate::cli::{Cli, CollectionArgs, DisplayArgs, ObjectArgs};
use crate::error::Result;
use crate::fetcher::DEFAULT_THREADS;
use crate::filter::FieldFilter;
use crate::iterator::IteratorOptions;
use crate::user_config::UserConfig;

pub const DEFAULT_HOST: &str = "www.virustotal.com";
pub const DEFAULT_INCLUDE: &str = "**";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Settings {
  #[serde(serialize_with = "mask")]
  pub apikey: String,
  pub host: String,
  pub threads: usize,
  pub include: Option<Vec<String>>,
  pub exclude: Option<Vec<String>>,
  pub identifiers_only: bool,
  pub relationships: Vec<String>,
  pub limit: usize,
  pub cursor: String,
  pub filter: String,
  pub verbose: bool,
  pub yaml: bool,
}

fn mask<S: serde::Serializer>(key: &str, s: S) -> Result<S::Ok, S::Error> {
  let chars: Vec<char> = key.chars().collect();
  if chars.len() > 8 {
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    s.serialize_str(&format!("{head}…{tail}"))
  } else if key.is_empty() {
    s.serialize_str("")
  } else {
    s.serialize_str("****")
  }
}

impl Settings {
  /// Merges global flags with the user config file.
  #[must_use]
  pub fn new(cli: &Cli, config: &UserConfig) -> Self {
    Self {
      apikey: cli
        .apikey
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| config.apikey.clone())
        .unwrap_or_default(),
      host: cli
        .host
        .clone()
        .or_else(|| config.host.clone())
        .unwrap_or_else(|| DEFAULT_HOST.to_string()),
      threads: config.threads.unwrap_or(DEFAULT_THREADS),
      include: None,
      exclude: None,
      identifiers_only: false,
      relationships: Vec::new(),
      limit: 0,
      cursor: String::new(),
      filter: String::new(),
      verbose: cli.verbose,
      yaml: cli.yaml,
    }
  }

  #[must_use]
  pub fn with_display(mut self, args: &DisplayArgs) -> Self {
    self.include.clone_from(&args.include);
    self.exclude.clone_from(&args.exclude);
    self.identifiers_only = args.identifiers_only;
    self
  }

  #[must_use]
  pub fn with_objects(mut self, args: &ObjectArgs) -> Self {
    if let Some(threads) = args.threads {
      self.threads = threads;
    }
    self.relationships.clone_from(&args.relationships);
    self.with_display(&args.display)
  }

  #[must_use]
  pub fn with_collection(mut self, args: &CollectionArgs) -> Self {
    self.limit = args.limit;
    self.cursor.clone_from(&args.cursor);
    self.filter.clone_from(&args.filter);
    self
  }

  /// The attribute filter to apply, or `None` when neither `--include` nor
  /// `--exclude` was given and attributes pass through untouched.
  ///
  /// # Errors
  ///
  /// Returns a configuration error if a pattern is invalid.
  pub fn field_filter(&self) -> Result<Option<FieldFilter>> {
    if self.include.is_none() && self.exclude.is_none() {
      return Ok(None);
    }
    let include = self
      .include
      .clone()
      .unwrap_or_else(|| vec![DEFAULT_INCLUDE.to_string()]);
    let exclude = self.exclude.clone().unwrap_or_default();
    FieldFilter::new(include, exclude).map(Some)
  }

  #[must_use]
  pub fn iterator_options(&self) -> IteratorOptions {
    IteratorOptions {
      limit: self.limit,
      cursor: self.cursor.clone(),
      filter: self.filter.clone(),
      ..Default::default()
    }
  }
}
