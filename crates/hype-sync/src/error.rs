//! Error types for `hype-sync`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Catalog(#[from] hype_catalog::Error),

  #[error(transparent)]
  Core(#[from] hype_core::Error),

  /// The backing document store failed; the concrete error is boxed so this
  /// type does not depend on any one backend.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("game {0} is not in the collection")]
  NotInCollection(u32),

  #[error("username {0:?} is already taken")]
  UsernameTaken(String),

  #[error("no profile has been saved yet")]
  NoProfile,
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self { Self::Store(Box::new(e)) }

  /// `true` when the catalog is still preparing an export.
  pub fn is_not_ready(&self) -> bool {
    matches!(self, Self::Catalog(e) if e.is_not_ready())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
