use console::Style;
use regex::Regex;
use reqwest::Url;
use serde_json::{Map, Value};
use std::io::{self, BufWriter, Stderr, Stdout, Write};
use std::sync::Arc;
use tracing::debug;

use crate::cli::Invocation;
use crate::client::{ObjectSource, ObjectType, PageSource};
use crate::error::{Error, Result};
use crate::fetcher::{self, Retrieval};
use crate::filter::FieldFilter;
use crate::input;
use crate::iterator::CollectionIterator;
use crate::object::{Object, Relationship};
use crate::settings::Settings;
use crate::yaml::{ColorEncoder, ColorScheme};

/// Value a relationship takes in the printed view: the bare id for
/// one-to-one relationships, a list of ids otherwise.
#[must_use]
pub fn fold_relationship(r: &Relationship) -> Value {
  if r.is_one_to_one {
    r.related_objects
      .first()
      .map_or(Value::Null, |o| Value::String(o.id.clone()))
  } else {
    Value::Array(
      r.related_objects
        .iter()
        .map(|o| Value::String(o.id.clone()))
        .collect(),
    )
  }
}

/// Projects an object's attributes and folds its relationships in.
#[must_use]
pub fn project_object(
  obj: &Object,
  filter: Option<&FieldFilter>,
) -> Map<String, Value> {
  let mut m = match filter {
    Some(f) => f.project(&obj.attributes),
    None => obj.attributes.clone(),
  };
  for (name, r) in &obj.relationships {
    m.insert(name.clone(), fold_relationship(r));
  }
  m
}

/// Builds the printed document: one single-key map per object, keyed by
/// `<type> <<id>>`, in the order given.
#[must_use]
pub fn project_objects(
  objs: &[Object],
  filter: Option<&FieldFilter>,
) -> Value {
  Value::Array(
    objs
      .iter()
      .map(|obj| {
        let mut entry = Map::new();
        let attrs = project_object(obj, filter);
        entry.insert(obj.display_key(), Value::Object(attrs));
        Value::Object(entry)
      })
      .collect(),
  )
}

/// Flags never repeated in the hint: the old cursor and the API key.
const HINT_SKIPPED_FLAGS: [&str; 2] = ["cursor", "apikey"];

/// The command line that fetches the next page, or `None` once the
/// collection is exhausted.
#[must_use]
pub fn cursor_hint(inv: &Invocation, cursor: &str) -> Option<String> {
  if cursor.is_empty() {
    return None;
  }
  let mut parts = vec![inv.command_path.clone()];
  parts.extend(inv.args.iter().map(|a| format!("'{a}'")));
  parts.extend(
    inv
      .flags
      .iter()
      .filter(|(name, _)| !HINT_SKIPPED_FLAGS.contains(&name.as_str()))
      .map(|(name, value)| format!("--{name}={value}")),
  );
  parts.push(format!("--cursor={cursor}"));
  Some(parts.join(" "))
}

/// Fetches objects and prints them as YAML.
pub struct ObjectPrinter<C: ?Sized, W = BufWriter<Stdout>, E = Stderr> {
  client: Arc<C>,
  settings: Settings,
  invocation: Invocation,
  filter: Option<FieldFilter>,
  colors: ColorScheme,
  hint_style: Style,
  out: W,
  err: E,
}

impl<C> ObjectPrinter<C>
where
  C: ObjectSource + PageSource + ?Sized + 'static,
{
  /// Printer writing to standard output, reporting to standard error.
  ///
  /// # Errors
  ///
  /// Returns a configuration error if the include/exclude patterns are
  /// invalid.
  pub fn new(
    client: Arc<C>,
    settings: Settings,
    invocation: Invocation,
  ) -> Result<Self> {
    let colors = ColorScheme::for_stdout(settings.yaml);
    let hint_style = if console::colors_enabled_stderr() {
      Style::new().dim().force_styling(true)
    } else {
      Style::new()
    };
    let mut p = Self::with_writers(
      client,
      settings,
      invocation,
      BufWriter::new(io::stdout()),
      io::stderr(),
    )?;
    p.colors = colors;
    p.hint_style = hint_style;
    Ok(p)
  }
}

impl<C, W, E> ObjectPrinter<C, W, E>
where
  C: ObjectSource + PageSource + ?Sized + 'static,
  W: Write,
  E: Write,
{
  /// Printer over arbitrary sinks, without colors.
  ///
  /// # Errors
  ///
  /// Returns a configuration error if the include/exclude patterns are
  /// invalid.
  pub fn with_writers(
    client: Arc<C>,
    settings: Settings,
    invocation: Invocation,
    out: W,
    err: E,
  ) -> Result<Self> {
    let filter = settings.field_filter()?;
    Ok(Self {
      client,
      settings,
      invocation,
      filter,
      colors: ColorScheme::plain(),
      hint_style: Style::new(),
      out,
      err,
    })
  }

  pub fn into_writers(self) -> (W, E) {
    (self.out, self.err)
  }

  /// Fetches the objects named by `args` (or by the lines of standard input
  /// when `args` is just `-`) and prints them.
  ///
  /// When `arg_re` is given, only identifiers matching it are fetched, and
  /// its first capture group (if any) is used as the identifier. Fetch
  /// failures are reported one per line on the error sink after all objects
  /// have been printed; they don't fail the call.
  ///
  /// # Errors
  ///
  /// Returns an error if writing or encoding the output fails.
  pub async fn print(
    &mut self,
    object_type: ObjectType,
    args: Vec<String>,
    arg_re: Option<Regex>,
  ) -> Result<()> {
    let ids = {
      let mut reader = input::reader_for(args, arg_re)?;
      input::collect_identifiers(&mut reader)
    };

    let Retrieval {
      mut objects,
      mut errors,
    } = fetcher::retrieve_objects(
      Arc::clone(&self.client),
      object_type,
      ids,
      self.settings.threads,
      &self.settings.relationships,
    );

    let mut objs = Vec::new();
    while let Some(obj) = objects.recv().await {
      if self.settings.identifiers_only {
        self.print_id(&obj)?;
      } else {
        objs.push(obj);
      }
    }

    if !objs.is_empty() {
      self.print_objects(&objs)?;
    }

    while let Some(e) = errors.recv().await {
      writeln!(self.err, "{e}")?;
    }
    Ok(())
  }

  /// Lists `collection` using the limit, cursor and filter from the
  /// settings.
  ///
  /// # Errors
  ///
  /// See [`print_iter`](Self::print_iter).
  pub async fn print_collection(&mut self, collection: Url) -> Result<()> {
    let it = CollectionIterator::new(
      Arc::clone(&self.client),
      collection,
      self.settings.iterator_options(),
    );
    self.print_iter(it).await
  }

  /// Prints everything `it` yields, followed by the command line that
  /// continues from where it stopped.
  ///
  /// # Errors
  ///
  /// Returns the iterator's error after printing whatever was retrieved
  /// before it, or an error if writing the output fails.
  pub async fn print_iter<S>(
    &mut self,
    mut it: CollectionIterator<S>,
  ) -> Result<()>
  where
    S: PageSource + ?Sized,
  {
    let mut objs = Vec::new();
    while it.next().await {
      let Some(obj) = it.get() else { break };
      if self.settings.identifiers_only {
        self.print_id(obj)?;
      } else {
        objs.push(obj.clone());
      }
    }

    debug!(count = it.count(), cursor = it.cursor(), "listing stopped");
    if !objs.is_empty() {
      self.print_objects(&objs)?;
    }
    self.print_cursor_hint(it.cursor())?;

    match it.into_error() {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  /// Prints a single object.
  ///
  /// # Errors
  ///
  /// Returns an error if encoding or writing fails.
  pub fn print_object(&mut self, obj: &Object) -> Result<()> {
    self.print_objects(std::slice::from_ref(obj))
  }

  /// Prints `objs` as one YAML list, in order.
  ///
  /// # Errors
  ///
  /// Returns an error if encoding or writing fails.
  pub fn print_objects(&mut self, objs: &[Object]) -> Result<()> {
    let doc = project_objects(objs, self.filter.as_ref());
    ColorEncoder::new(&mut self.out, self.colors.clone())
      .encode(&doc)
      .map_err(|e| Error::Encode(e.to_string()))?;
    self.out.flush()?;
    Ok(())
  }

  fn print_id(&mut self, obj: &Object) -> Result<()> {
    writeln!(self.out, "{}", obj.id)?;
    self.out.flush()?;
    Ok(())
  }

  fn print_cursor_hint(&mut self, cursor: &str) -> Result<()> {
    if let Some(line) = cursor_hint(&self.invocation, cursor) {
      writeln!(
        self.err,
        "{}",
        self.hint_style.apply_to(format!("\nMORE WITH:\n{line}"))
      )?;
    }
    Ok(())
  }
}
