//! Route handlers. Each validates its query, forwards to the catalog, and
//! maps failures through [`ApiError`].

use axum::{
  Json,
  extract::{Query, State},
  http::header,
  response::{IntoResponse, Response},
};
use hype_catalog::{Error as CatalogError, HttpFetch, RetryPolicy};
use serde::Deserialize;
use tracing::debug;

use crate::{AppState, error::ApiError};

const SEARCH_MAX_AGE: u32 = 300;
const THING_MAX_AGE: u32 = 300;
const COLLECTION_MAX_AGE: u32 = 60;
const SCRAPE_MAX_AGE: u32 = 300;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThingParams {
  id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionParams {
  username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeParams {
  url: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
  value
    .filter(|v| !v.trim().is_empty())
    .ok_or_else(|| CatalogError::ClientInput(format!("missing {name} parameter")).into())
}

fn cache_control(max_age: u32) -> (header::HeaderName, String) {
  (header::CACHE_CONTROL, format!("public, max-age={max_age}"))
}

fn xml(body: String, max_age: u32) -> Response {
  (
    [
      (header::CONTENT_TYPE, "application/xml".to_string()),
      cache_control(max_age),
    ],
    body,
  )
    .into_response()
}

fn require_token<F: HttpFetch>(state: &AppState<F>) -> Result<(), ApiError> {
  if state.client.has_token() { Ok(()) } else { Err(ApiError::MissingToken) }
}

/// `GET /api/bgg/search?q=<query>`
pub async fn search<F: HttpFetch>(
  State(state): State<AppState<F>>,
  Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
  let q = required(params.q, "query")?;
  require_token(&state)?;
  let body = state.client.search_raw(&q).await?;
  Ok(xml(body, SEARCH_MAX_AGE))
}

/// `GET /api/bgg/thing?id=<id>`
pub async fn thing<F: HttpFetch>(
  State(state): State<AppState<F>>,
  Query(params): Query<ThingParams>,
) -> Result<Response, ApiError> {
  let raw = required(params.id, "id")?;
  let id: u32 = raw
    .trim()
    .parse()
    .map_err(|_| CatalogError::ClientInput(format!("invalid id: {raw}")))?;
  require_token(&state)?;
  let body = state.client.thing_raw(id).await?;
  Ok(xml(body, THING_MAX_AGE))
}

/// `GET /api/bgg/collection?username=<name>`
///
/// Polls while the catalog prepares the export; the token is optional here.
pub async fn collection<F: HttpFetch>(
  State(state): State<AppState<F>>,
  Query(params): Query<CollectionParams>,
) -> Result<Response, ApiError> {
  let username = required(params.username, "username")?;
  let body = state
    .client
    .owned_collection_raw(&username, RetryPolicy::RELAY)
    .await?;
  debug!(%username, bytes = body.len(), "relayed collection");
  Ok(xml(body, COLLECTION_MAX_AGE))
}

/// `GET /api/bgg/scrape?url=<item page url>`
pub async fn scrape<F: HttpFetch>(
  State(state): State<AppState<F>>,
  Query(params): Query<ScrapeParams>,
) -> Result<Response, ApiError> {
  let url = required(params.url, "url")?;
  let game = state.client.scrape(&url).await?;
  Ok(([cache_control(SCRAPE_MAX_AGE)], Json(game)).into_response())
}
