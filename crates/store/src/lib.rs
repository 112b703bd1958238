//! SQLite persistence for Worldview.
//!
//! One database file holds both stores:
//! - items + keyword index + FTS5 full-text search (ingestion side)
//! - belief axes with append-only evidence, drift state/alerts,
//!   merge proposals, redirects, and the axis embedding cache (belief side)
//!
//! The two sides share a pool but fail independently: a corrupt axis row
//! surfaces as a `StoreError` from an `AxisStore` call and never blocks
//! ingestion.

pub mod sqlite;

pub use sqlite::SqliteStore;
