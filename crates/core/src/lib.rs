//! # Worldview Core
//!
//! Domain types, traits, and error definitions for the Worldview belief
//! engine. This crate defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod axis;
pub mod cluster;
pub mod error;
pub mod item;
pub mod services;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use axis::{
    AxisDelta, BeliefAxis, DriftAlert, DriftDirection, DriftState, EvidenceEntry, MergeProposal,
    PoleAlignment, StanceVerdict,
};
pub use cluster::{Cluster, Digest};
pub use error::{Error, Result};
pub use item::{Item, ItemScores, KeywordEntry, RawItem};
pub use services::{Embedder, NoReputation, ReputationProvider, StanceValidator};
pub use store::{AxisStore, ItemStore};
