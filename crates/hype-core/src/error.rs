//! Error types for `hype-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("write batch is full ({0} operations)")]
  BatchFull(usize),

  #[error("invalid username: {0}")]
  InvalidUsername(&'static str),

  #[error("unknown hype direction: {0}")]
  InvalidDirection(i8),

  #[error("document is not an object")]
  NotAnObject,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
