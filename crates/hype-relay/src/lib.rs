//! Thin HTTP relay in front of the board-game catalog.
//!
//! Browsers cannot call the catalog directly (no CORS, and the API token must
//! stay server-side), so these routes forward requests with the credential
//! attached and pass the catalog's answer back:
//!
//! | Route                              | Upstream              | Cache   |
//! |------------------------------------|-----------------------|---------|
//! | `GET /api/bgg/search?q=`           | XML search            | 300 s   |
//! | `GET /api/bgg/thing?id=`           | XML item detail       | 300 s   |
//! | `GET /api/bgg/collection?username=`| XML collection, polled| 60 s    |
//! | `GET /api/bgg/scrape?url=`         | item page → JSON      | 300 s   |

pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::sync::Arc;

use axum::{Router, routing::get};
use hype_catalog::{CatalogClient, CatalogConfig, HttpFetch, ReqwestFetcher};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime relay configuration, deserialised from `config.toml` and
/// `HYPE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
  pub host:         String,
  pub port:         u16,
  pub api_token:    Option<String>,
  pub user_agent:   String,
  pub xml_api_base: String,
  pub site_base:    String,
}

impl Default for RelayConfig {
  fn default() -> Self {
    let catalog = CatalogConfig::default();
    Self {
      host:         "127.0.0.1".to_string(),
      port:         8787,
      api_token:    None,
      user_agent:   catalog.user_agent,
      xml_api_base: catalog.xml_api_base,
      site_base:    catalog.site_base,
    }
  }
}

impl RelayConfig {
  /// The catalog client settings this relay forwards with.
  pub fn catalog(&self) -> CatalogConfig {
    CatalogConfig {
      xml_api_base: self.xml_api_base.clone(),
      site_base: self.site_base.clone(),
      api_token: self.api_token.clone().filter(|t| !t.is_empty()),
      user_agent: self.user_agent.clone(),
      ..CatalogConfig::default()
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<F = ReqwestFetcher> {
  pub client: Arc<CatalogClient<F>>,
}

impl<F> Clone for AppState<F> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
    }
  }
}

impl<F: HttpFetch> AppState<F> {
  pub fn new(client: CatalogClient<F>) -> Self {
    Self {
      client: Arc::new(client),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the relay's axum [`Router`].
pub fn router<F>(state: AppState<F>) -> Router
where
  F: HttpFetch + 'static,
{
  Router::new()
    .route("/api/bgg/search",     get(handlers::search::<F>))
    .route("/api/bgg/thing",      get(handlers::thing::<F>))
    .route("/api/bgg/collection", get(handlers::collection::<F>))
    .route("/api/bgg/scrape",     get(handlers::scrape::<F>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
