//! The belief engine: evidence aggregation over axes, CUSUM drift
//! detection, embedding-based redundancy scanning, and application of
//! externally produced deltas and merges.
//!
//! All derived axis state (score, confidence) is recomputed from the full
//! evidence log on every append; the engine never adjusts it incrementally.

pub mod aggregate;
pub mod apply;
pub mod drift;
pub mod redundancy;

pub use aggregate::BeliefEngine;
pub use apply::ApplyReport;
pub use redundancy::RedundancyScanner;
