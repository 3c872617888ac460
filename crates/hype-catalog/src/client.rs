//! `CatalogClient`: the adapters bound to the catalog's URLs.

use std::time::Duration;

use hype_core::game::{CanonicalGame, SearchResult};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
  error::{Error, Result},
  fetch::{
    FetchRequest, HttpFetch, PROCESSING_STATUS, ReqwestFetcher, RetryPolicy, fetch_with_retry,
  },
  scrape, xml,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── Config ──────────────────────────────────────────────────────────────────

/// Where the catalog lives and how to identify ourselves to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
  pub xml_api_base:      String,
  pub site_base:         String,
  /// Sent as a bearer token on XML API requests when present.
  pub api_token:         Option<String>,
  pub user_agent:        String,
  /// Sent when fetching HTML item pages.
  pub scrape_user_agent: String,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      xml_api_base:      "https://boardgamegeek.com/xmlapi2".to_string(),
      site_base:         "https://boardgamegeek.com".to_string(),
      api_token:         None,
      user_agent:        "BoardGameHype/1.0".to_string(),
      scrape_user_agent: "Mozilla/5.0 (compatible; BoardGameHype/1.0)".to_string(),
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Issues catalog requests and decodes the answers into canonical records.
///
/// The `*_raw` methods return the catalog's body untouched; the relay passes
/// those straight through.
#[derive(Debug, Clone)]
pub struct CatalogClient<F = ReqwestFetcher> {
  config:  CatalogConfig,
  fetcher: F,
}

impl CatalogClient<ReqwestFetcher> {
  pub fn new(config: CatalogConfig) -> Result<Self> {
    Ok(Self::with_fetcher(config, ReqwestFetcher::new(REQUEST_TIMEOUT)?))
  }
}

impl<F: HttpFetch> CatalogClient<F> {
  pub fn with_fetcher(config: CatalogConfig, fetcher: F) -> Self { Self { config, fetcher } }

  pub fn config(&self) -> &CatalogConfig { &self.config }

  pub fn has_token(&self) -> bool {
    self.config.api_token.as_deref().is_some_and(|t| !t.is_empty())
  }

  // ── Search ────────────────────────────────────────────────────────────────

  pub async fn search_raw(&self, query: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
      return Err(Error::ClientInput("missing search query".into()));
    }
    let url = self.api_url("search", &[("query", query), ("type", "boardgame")])?;
    self.fetch_once(self.api_request(url)).await
  }

  /// Search by name, newest first.
  pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
    let body = self.search_raw(query).await?;
    let results = xml::parse_search(&body)?;
    debug!(query, hits = results.len(), "catalog search");
    Ok(results)
  }

  // ── Item detail ───────────────────────────────────────────────────────────

  pub async fn thing_raw(&self, id: u32) -> Result<String> {
    if id == 0 {
      return Err(Error::ClientInput("missing item id".into()));
    }
    let url = self.api_url("thing", &[("id", &id.to_string()), ("stats", "1")])?;
    self.fetch_once(self.api_request(url)).await
  }

  /// Full detail for one item; `None` if the catalog has no such item.
  pub async fn thing(&self, id: u32) -> Result<Option<CanonicalGame>> {
    let body = self.thing_raw(id).await?;
    xml::parse_thing(&body)
  }

  // ── Owned collection ──────────────────────────────────────────────────────

  /// Poll for `username`'s collection export under `policy`.
  pub async fn owned_collection_raw(&self, username: &str, policy: RetryPolicy) -> Result<String> {
    let username = username.trim();
    if username.is_empty() {
      return Err(Error::ClientInput("missing username".into()));
    }
    let url = self.api_url(
      "collection",
      &[("username", username), ("stats", "1"), ("subtype", "boardgame")],
    )?;
    fetch_with_retry(&self.fetcher, &self.api_request(url), policy).await
  }

  /// The games `username` marks as owned.
  pub async fn owned_collection(
    &self,
    username: &str,
    policy: RetryPolicy,
  ) -> Result<Vec<CanonicalGame>> {
    let body = self.owned_collection_raw(username, policy).await?;
    let games = xml::parse_collection(&body)?;
    info!(username, owned = games.len(), "fetched owned collection");
    Ok(games)
  }

  // ── Item page ─────────────────────────────────────────────────────────────

  /// Read an item page by URL. Only the id is taken from `url`; the page is
  /// always fetched from its canonical address.
  pub async fn scrape(&self, url: &str) -> Result<CanonicalGame> {
    let url = url.trim();
    if url.is_empty() {
      return Err(Error::ClientInput("missing url".into()));
    }
    self.scrape_id(scrape::extract_item_id(url)?).await
  }

  pub async fn scrape_id(&self, id: u32) -> Result<CanonicalGame> {
    let page = format!("{}/boardgame/{id}", self.config.site_base.trim_end_matches('/'));
    let request = FetchRequest::new(page)
      .header("User-Agent", self.config.scrape_user_agent.as_str())
      .header("Accept", "text/html");
    let html = self.fetch_once(request).await?;
    scrape::parse_item_page(&html, id)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  fn api_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String> {
    let base = format!("{}/{endpoint}", self.config.xml_api_base.trim_end_matches('/'));
    Url::parse_with_params(&base, params)
      .map(String::from)
      .map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))
  }

  fn api_request(&self, url: String) -> FetchRequest {
    FetchRequest::new(url)
      .header("User-Agent", self.config.user_agent.as_str())
      .bearer(self.config.api_token.as_deref())
  }

  async fn fetch_once(&self, request: FetchRequest) -> Result<String> {
    let resp = self.fetcher.fetch(request).await?;
    if resp.status == PROCESSING_STATUS {
      return Err(Error::NotReady);
    }
    if !resp.is_success() {
      return Err(Error::Upstream {
        status: resp.status,
      });
    }
    Ok(resp.body)
  }
}
