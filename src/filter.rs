//! Attribute projection through glob-style include/exclude patterns.
//!
//! Attribute keys are matched as dotted paths, so nested maps can be
//! filtered too: `last_analysis_results.*.category` keeps only the category
//! of every engine result. `*` never crosses a `.`, `**` does.

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A compiled glob pattern over dotted attribute paths.
#[derive(Debug, Clone)]
pub struct Glob {
  pattern: String,
  re: Regex,
}

impl Glob {
  /// Compiles `pattern`.
  ///
  /// # Errors
  ///
  /// Fails only if the translated expression is rejected by the regex
  /// engine, which would indicate a size limit being exceeded.
  pub fn new(pattern: &str) -> Result<Self> {
    let mut expr = String::with_capacity(pattern.len() * 2 + 2);
    expr.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
      match c {
        '*' if chars.peek() == Some(&'*') => {
          chars.next();
          expr.push_str(".*");
        }
        '*' => expr.push_str("[^.]*"),
        '?' => expr.push_str("[^.]"),
        c => expr.push_str(&regex::escape(&c.to_string())),
      }
    }
    expr.push('$');
    let re = Regex::new(&expr)
      .map_err(|e| Error::config(format!("invalid pattern {pattern:?}: {e}")))?;
    Ok(Self {
      pattern: pattern.to_string(),
      re,
    })
  }

  #[must_use]
  pub fn is_match(&self, path: &str) -> bool {
    self.re.is_match(path)
  }

  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.pattern
  }
}

/// The include/exclude pattern pair applied to every printed object.
#[derive(Debug, Clone)]
pub struct FieldFilter {
  include: Vec<Glob>,
  exclude: Vec<Glob>,
}

impl FieldFilter {
  /// # Errors
  ///
  /// Returns [`Error::Config`] if any pattern fails to compile.
  pub fn new<I, E>(include: I, exclude: E) -> Result<Self>
  where
    I: IntoIterator,
    I::Item: AsRef<str>,
    E: IntoIterator,
    E::Item: AsRef<str>,
  {
    let compile = |p: &str| Glob::new(p.trim());
    Ok(Self {
      include: include
        .into_iter()
        .map(|p| compile(p.as_ref()))
        .collect::<Result<_>>()?,
      exclude: exclude
        .into_iter()
        .map(|p| compile(p.as_ref()))
        .collect::<Result<_>>()?,
    })
  }

  fn included(&self, path: &str) -> bool {
    self.include.iter().any(|g| g.is_match(path))
  }

  fn excluded(&self, path: &str) -> bool {
    self.exclude.iter().any(|g| g.is_match(path))
  }

  /// Returns the subset of `attrs` whose paths match at least one include
  /// pattern and no exclude pattern.
  ///
  /// A nested map whose own path is included brings its whole subtree
  /// along, minus anything excluded. Maps left empty by filtering are
  /// dropped.
  #[must_use]
  pub fn project(&self, attrs: &Map<String, Value>) -> Map<String, Value> {
    self.project_map(attrs, "", false)
  }

  fn project_map(
    &self,
    attrs: &Map<String, Value>,
    prefix: &str,
    parent_included: bool,
  ) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in attrs {
      let path = if prefix.is_empty() {
        key.clone()
      } else {
        format!("{prefix}.{key}")
      };
      if self.excluded(&path) {
        continue;
      }
      let included = parent_included || self.included(&path);
      match value {
        Value::Object(inner) if !inner.is_empty() => {
          let projected = self.project_map(inner, &path, included);
          if !projected.is_empty() {
            out.insert(key.clone(), Value::Object(projected));
          }
        }
        _ if included => {
          out.insert(key.clone(), value.clone());
        }
        _ => {}
      }
    }
    out
  }
}
