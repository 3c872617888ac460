//! Core types and trait definitions for the board-game hype tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! catalog adapters, the SQLite backend and the reconciliation engine all
//! depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod coerce;
pub mod entry;
pub mod error;
pub mod game;
pub mod hype;
pub mod profile;
pub mod session;
pub mod store;

pub use error::{Error, Result};
