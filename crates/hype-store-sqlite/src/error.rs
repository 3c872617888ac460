//! Error type for `hype-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// An update targeted a document that does not exist.
  #[error("document not found: {0}")]
  NotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
