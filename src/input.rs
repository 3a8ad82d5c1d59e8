//! Sources of identifiers: literal arguments, line-delimited streams, and
//! regex-filtered views over either.

use regex::Regex;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::warn;

/// A lazy, finite sequence of strings.
///
/// `Ok(None)` marks the end of the stream. Readers are not rewindable.
pub trait StringReader {
  fn read_string(&mut self) -> io::Result<Option<String>>;
}

impl<R: StringReader + ?Sized> StringReader for Box<R> {
  fn read_string(&mut self) -> io::Result<Option<String>> {
    (**self).read_string()
  }
}

/// Yields a fixed list of strings in order.
pub struct StringArrayReader {
  items: std::vec::IntoIter<String>,
}

impl StringArrayReader {
  #[must_use]
  pub fn new(items: Vec<String>) -> Self {
    Self {
      items: items.into_iter(),
    }
  }
}

impl StringReader for StringArrayReader {
  fn read_string(&mut self) -> io::Result<Option<String>> {
    Ok(self.items.next())
  }
}

/// Yields one line at a time from a byte stream, without the line ending.
pub struct StringIoReader<R> {
  reader: R,
  buf: String,
}

impl<R: BufRead> StringIoReader<R> {
  pub const fn new(reader: R) -> Self {
    Self {
      reader,
      buf: String::new(),
    }
  }
}

impl StringIoReader<Box<dyn BufRead>> {
  /// Opens `path` for reading, `-` meaning standard input.
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be opened.
  pub fn open(path: &str) -> io::Result<Self> {
    let reader: Box<dyn BufRead> = if path == "-" {
      Box::new(io::stdin().lock())
    } else {
      Box::new(BufReader::new(File::open(path)?))
    };
    Ok(Self::new(reader))
  }
}

impl<R: BufRead> StringReader for StringIoReader<R> {
  fn read_string(&mut self) -> io::Result<Option<String>> {
    self.buf.clear();
    if self.reader.read_line(&mut self.buf)? == 0 {
      return Ok(None);
    }
    let line = self.buf.trim_end_matches(['\n', '\r']);
    Ok(Some(line.to_string()))
  }
}

/// Passes through only the strings matching a regular expression.
///
/// A match yields its first capture group when the expression has one that
/// participated in the match, otherwise the whole match. Strings that don't
/// match are dropped.
pub struct FilteredStringReader<R> {
  inner: R,
  re: Regex,
}

impl<R: StringReader> FilteredStringReader<R> {
  pub const fn new(inner: R, re: Regex) -> Self {
    Self { inner, re }
  }
}

impl<R: StringReader> StringReader for FilteredStringReader<R> {
  fn read_string(&mut self) -> io::Result<Option<String>> {
    while let Some(s) = self.inner.read_string()? {
      if let Some(caps) = self.re.captures(&s) {
        let m = caps.get(1).or_else(|| caps.get(0));
        if let Some(m) = m {
          return Ok(Some(m.as_str().to_string()));
        }
      }
    }
    Ok(None)
  }
}

/// Picks the reader for a raw argument list: a lone `-` reads standard
/// input, anything else is taken literally. `re` filters either one.
///
/// # Errors
///
/// Returns an error if the input stream cannot be opened.
pub fn reader_for(
  args: Vec<String>,
  re: Option<Regex>,
) -> io::Result<Box<dyn StringReader>> {
  let base: Box<dyn StringReader> = if args.len() == 1 && args[0] == "-" {
    Box::new(StringIoReader::open(&args[0])?)
  } else {
    Box::new(StringArrayReader::new(args))
  };
  Ok(match re {
    Some(re) => Box::new(FilteredStringReader::new(base, re)),
    None => base,
  })
}

/// Drains a reader into a list of identifiers.
///
/// Empty strings are skipped. A read error ends the stream early; whatever
/// was read before it is kept.
pub fn collect_identifiers<R: StringReader + ?Sized>(r: &mut R) -> Vec<String> {
  let mut ids = Vec::new();
  loop {
    match r.read_string() {
      Ok(Some(s)) if s.is_empty() => {}
      Ok(Some(s)) => ids.push(s),
      Ok(None) => break,
      Err(e) => {
        warn!("stopped reading identifiers: {e}");
        break;
      }
    }
  }
  ids
}
