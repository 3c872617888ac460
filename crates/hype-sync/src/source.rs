//! Where the engine gets fresh catalog data from.

use std::future::Future;

use hype_catalog::{CatalogClient, HttpFetch, RetryPolicy};
use hype_core::game::CanonicalGame;

/// The catalog reads the reconciliation engine needs.
///
/// Implemented for [`CatalogClient`]; tests substitute canned data.
pub trait GameSource: Send + Sync {
  /// Full detail for one item, read from its page.
  fn item_page(
    &self,
    id: u32,
  ) -> impl Future<Output = hype_catalog::Result<CanonicalGame>> + Send + '_;

  /// The games `username` owns, polled under `policy`.
  fn owned_collection<'a>(
    &'a self,
    username: &'a str,
    policy: RetryPolicy,
  ) -> impl Future<Output = hype_catalog::Result<Vec<CanonicalGame>>> + Send + 'a;
}

impl<F> GameSource for CatalogClient<F>
where
  F: HttpFetch,
{
  async fn item_page(&self, id: u32) -> hype_catalog::Result<CanonicalGame> {
    self.scrape_id(id).await
  }

  async fn owned_collection(
    &self,
    username: &str,
    policy: RetryPolicy,
  ) -> hype_catalog::Result<Vec<CanonicalGame>> {
    CatalogClient::owned_collection(self, username, policy).await
  }
}
