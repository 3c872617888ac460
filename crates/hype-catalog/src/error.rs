//! Error taxonomy for catalog access.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A required parameter was missing or malformed. Never retried.
  #[error("invalid input: {0}")]
  ClientInput(String),

  /// The catalog is still preparing an export and the retry bound ran out.
  #[error("the catalog is still preparing this collection; try again shortly")]
  NotReady,

  /// The catalog answered with a non-success status.
  #[error("catalog returned status {status}")]
  Upstream { status: u16 },

  /// The expected structure was absent from the HTML, XML or JSON payload.
  #[error("unexpected catalog response: {0}")]
  Parse(String),

  /// The response was well-formed but carried no item.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid catalog url: {0}")]
  InvalidUrl(String),

  #[error("transport error: {0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// `true` when the caller should offer "try again shortly" rather than
  /// report a failure.
  pub fn is_not_ready(&self) -> bool { matches!(self, Self::NotReady) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
