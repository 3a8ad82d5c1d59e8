//! Block-style YAML output with optional coloring.
//!
//! Strings are emitted plain when that is unambiguous and double-quoted
//! otherwise, so uncolored output parses back to the value it came from.

use chrono::DateTime;
use console::Style;
use serde_json::{Map, Value};
use std::io::{self, Write};

/// Styles applied to keys, scalar values and trailing comments.
#[derive(Debug, Clone)]
pub struct ColorScheme {
  pub key: Style,
  pub value: Style,
  pub comment: Style,
}

impl ColorScheme {
  /// Yellow keys, bright green values, faint comments.
  #[must_use]
  pub fn colored() -> Self {
    Self {
      key: Style::new().yellow().force_styling(true),
      value: Style::new().green().bright().force_styling(true),
      comment: Style::new().dim().force_styling(true),
    }
  }

  /// Colored when standard output is a terminal, unless `plain` is set.
  #[must_use]
  pub fn for_stdout(plain: bool) -> Self {
    if plain || !console::colors_enabled() {
      Self::plain()
    } else {
      Self::colored()
    }
  }

  /// No escape sequences at all.
  #[must_use]
  pub fn plain() -> Self {
    Self {
      key: Style::new(),
      value: Style::new(),
      comment: Style::new(),
    }
  }
}

impl Default for ColorScheme {
  fn default() -> Self {
    Self::colored()
  }
}

const RESERVED: [&str; 11] = [
  "null", "~", "true", "false", "yes", "no", "on", "off", "y", "n", "",
];

fn needs_quotes(s: &str) -> bool {
  let lower = s.to_ascii_lowercase();
  if RESERVED.contains(&lower.as_str()) {
    return true;
  }
  let first = s.chars().next().unwrap_or(' ');
  let last = s.chars().last().unwrap_or(' ');
  if first.is_whitespace()
    || last.is_whitespace()
    || "-?:,[]{}#&*!|>'\"%@`".contains(first)
    || last == ':'
    || s.contains(": ")
    || s.contains(" #")
    || s.chars().any(|c| !is_printable(c))
  {
    return true;
  }
  looks_numeric(&lower)
}

fn looks_numeric(lower: &str) -> bool {
  let unsigned = lower.trim_start_matches(['+', '-']);
  lower.parse::<f64>().is_ok()
    || unsigned.starts_with("0x")
    || unsigned.starts_with("0o")
    || unsigned.starts_with("0b")
    || matches!(unsigned, ".inf" | ".nan")
    || (unsigned.starts_with(|c: char| c.is_ascii_digit())
      && unsigned.replace('_', "").parse::<f64>().is_ok())
}

fn scalar_text(v: &Value) -> String {
  match v {
    Value::Null => "null".to_string(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::String(s) => quote(s),
    Value::Array(_) => "[]".to_string(),
    Value::Object(_) => "{}".to_string(),
  }
}

/// Characters YAML allows unescaped in a double-quoted scalar. Line and
/// paragraph separators count as breaks and are left out.
const fn is_printable(c: char) -> bool {
  matches!(c,
    '\u{20}'..='\u{7e}'
    | '\u{a0}'..='\u{2027}'
    | '\u{202a}'..='\u{d7ff}'
    | '\u{e000}'..='\u{fefe}'
    | '\u{ff00}'..='\u{fffd}'
    | '\u{10000}'..='\u{10ffff}')
}

fn double_quoted(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for c in s.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\t' => out.push_str("\\t"),
      '\r' => out.push_str("\\r"),
      c if is_printable(c) => out.push(c),
      c => out.push_str(&format!("\\u{:04x}", u32::from(c))),
    }
  }
  out.push('"');
  out
}

fn quote(s: &str) -> String {
  if needs_quotes(s) {
    double_quoted(s)
  } else {
    s.to_string()
  }
}

/// Human-readable rendering of a unix timestamp stored under a `*_date` key.
fn date_comment(key: &str, v: &Value) -> Option<String> {
  if !key.ends_with("_date") {
    return None;
  }
  let ts = v.as_i64()?;
  let dt = DateTime::from_timestamp(ts, 0)?;
  Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Writes `serde_json::Value`s as YAML documents.
pub struct ColorEncoder<W> {
  w: W,
  colors: ColorScheme,
}

impl<W: Write> ColorEncoder<W> {
  pub const fn new(w: W, colors: ColorScheme) -> Self {
    Self { w, colors }
  }

  /// Encodes `value` as a YAML document.
  ///
  /// # Errors
  ///
  /// Propagates any error from the underlying writer.
  pub fn encode(&mut self, value: &Value) -> io::Result<()> {
    match value {
      Value::Array(items) if !items.is_empty() => self.seq(items, 0),
      Value::Object(map) if !map.is_empty() => self.map(map, 0, false),
      scalar => {
        let text = scalar_text(scalar);
        writeln!(self.w, "{}", self.colors.value.apply_to(text))
      }
    }
  }

  pub fn into_inner(self) -> W {
    self.w
  }

  fn indent(&mut self, n: usize) -> io::Result<()> {
    write!(self.w, "{:n$}", "")
  }

  fn map(
    &mut self,
    map: &Map<String, Value>,
    indent: usize,
    first_inline: bool,
  ) -> io::Result<()> {
    for (i, (key, value)) in map.iter().enumerate() {
      if i > 0 || !first_inline {
        self.indent(indent)?;
      }
      write!(self.w, "{}:", self.colors.key.apply_to(quote(key)))?;
      match value {
        Value::Object(inner) if !inner.is_empty() => {
          writeln!(self.w)?;
          self.map(inner, indent + 2, false)?;
        }
        Value::Array(items) if !items.is_empty() => {
          writeln!(self.w)?;
          self.seq(items, indent + 2)?;
        }
        scalar => {
          let text = scalar_text(scalar);
          write!(self.w, " {}", self.colors.value.apply_to(text))?;
          if let Some(comment) = date_comment(key, scalar) {
            write!(
              self.w,
              "  {}",
              self.colors.comment.apply_to(format!("# {comment}"))
            )?;
          }
          writeln!(self.w)?;
        }
      }
    }
    Ok(())
  }

  fn seq(&mut self, items: &[Value], indent: usize) -> io::Result<()> {
    for item in items {
      self.indent(indent)?;
      match item {
        Value::Object(map) if !map.is_empty() => {
          write!(self.w, "- ")?;
          self.map(map, indent + 2, true)?;
        }
        Value::Array(inner) if !inner.is_empty() => {
          writeln!(self.w, "-")?;
          self.seq(inner, indent + 2)?;
        }
        scalar => {
          let text = scalar_text(scalar);
          writeln!(self.w, "- {}", self.colors.value.apply_to(text))?;
        }
      }
    }
    Ok(())
  }
}
