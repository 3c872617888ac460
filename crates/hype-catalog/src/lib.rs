//! Source adapters for the board-game catalog.
//!
//! Three representations of a game arrive from the catalog:
//!
//! - the collection CSV export ([`csv`]),
//! - the XML API: search, item detail and owned collection ([`xml`]),
//! - the JSON blob embedded in an item's HTML page ([`scrape`]).
//!
//! Each adapter is a pure function from text to
//! [`CanonicalGame`](hype_core::game::CanonicalGame)s. [`CatalogClient`]
//! binds them to the catalog's URLs over the [`HttpFetch`] seam, polling
//! slow exports under a [`RetryPolicy`].

pub mod client;
pub mod csv;
pub mod error;
pub mod fetch;
pub mod scrape;
pub mod text;
pub mod xml;

pub use client::{CatalogClient, CatalogConfig};
pub use error::{Error, Result};
pub use fetch::{FetchRequest, FetchResponse, HttpFetch, ReqwestFetcher, RetryPolicy};
