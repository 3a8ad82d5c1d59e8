use thiserror::Error;

/// Errors surfaced by the retrieval and rendering core.
#[derive(Debug, Error)]
pub enum Error {
  /// Invalid or missing configuration. Fatal to the invocation.
  #[error("{0}")]
  Config(String),

  /// The API answered with a structured error body.
  #[error("{code}: {message}")]
  Api { code: String, message: String },

  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("invalid API response: {0}")]
  Decode(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error("failed to encode output: {0}")]
  Encode(String),
}

impl Error {
  pub fn config(msg: impl Into<String>) -> Self {
    Self::Config(msg.into())
  }

  #[must_use]
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::Api { code, .. } if code == "NotFoundError")
  }
}

/// A failure to retrieve a single identifier. Never fatal to a batch.
#[derive(Debug, Error)]
#[error("{id}: {source}")]
pub struct FetchError {
  pub id: String,
  #[source]
  pub source: Error,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fetch_error_mentions_identifier() {
    let err = FetchError {
      id: "abc".into(),
      source: Error::Api {
        code: "NotFoundError".into(),
        message: "File \"abc\" not found".into(),
      },
    };
    assert!(err.source.is_not_found());
    assert_eq!(
      err.to_string(),
      "abc: NotFoundError: File \"abc\" not found"
    );
  }
}
