//! Relay errors and their HTTP mapping.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use hype_catalog::Error as CatalogError;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Catalog(#[from] CatalogError),

  /// The endpoint needs the catalog API credential and none is configured.
  #[error("catalog API token not configured")]
  MissingToken,
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::MissingToken => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Catalog(e) => match e {
        CatalogError::ClientInput(_) => StatusCode::BAD_REQUEST,
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::NotReady => StatusCode::ACCEPTED,
        CatalogError::Upstream { status } => {
          StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        CatalogError::Parse(_) | CatalogError::InvalidUrl(_) | CatalogError::Transport(_) => {
          StatusCode::BAD_GATEWAY
        }
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      warn!(%status, error = %self, "relay request failed");
    }
    (status, self.to_string()).into_response()
  }
}
