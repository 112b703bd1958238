//! The Worldview ingestion pipeline.
//!
//! Turns a bounded batch of raw feed items into persisted, scored items and
//! a compact digest: keyword extraction, composite scoring, near-duplicate
//! removal, top-K selection, corpus novelty, clustering, and burst tagging.

pub mod cluster;
pub mod dedup;
pub mod ingest;
pub mod keywords;
pub mod scoring;

pub use ingest::IngestPipeline;
