//! Error taxonomy shared by the query cache and the backend client.
//!
//! Errors are `Clone` because a failed fetch is stored on its cache entry and
//! handed to every observer of that key.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// Transport failure: connection refused, timeout, unreadable body.
  #[error("Network error: {0}")]
  Network(String),

  /// Non-success HTTP status. `message` is the server's detail when it sent one.
  #[error("{message}")]
  Server { status: u16, message: String },

  /// Caller-supplied input rejected before any request was made.
  #[error("Invalid input: {0}")]
  Validation(String),

  /// No fetcher registered for the query name of a key.
  #[error("No fetcher registered for query '{0}'")]
  UnknownQuery(String),

  /// A cached value was read back as a different type than it was stored with.
  #[error("Cached value for {0} has an unexpected type")]
  TypeMismatch(String),
}

impl Error {
  /// Build a server error, falling back to a generic message when the
  /// response carried no usable detail.
  pub fn server(status: u16, detail: Option<String>) -> Self {
    let message = detail
      .filter(|d| !d.trim().is_empty())
      .unwrap_or_else(|| format!("Request failed with status {}", status));
    Error::Server { status, message }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::Server { status: 404, .. })
  }
}

impl From<reqwest::Error> for Error {
  fn from(err: reqwest::Error) -> Self {
    Error::Network(err.to_string())
  }
}
