//! The reconciliation engine.
//!
//! Merges freshly fetched catalog records into a user's collection without
//! touching user-entered fields, runs the polite enrichment backfill, and
//! carries out explicit user actions and profile changes.
//!
//! Everything operates on a caller-owned [`Session`](hype_core::session::Session);
//! there is no global state.

pub mod actions;
pub mod engine;
pub mod error;
pub mod profile;
pub mod source;

pub use engine::{EnrichSummary, ImportProgress, ImportSummary, Phase, Reconciler};
pub use error::{Error, Result};
pub use source::GameSource;

#[cfg(test)]
mod tests;
