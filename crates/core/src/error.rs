//! Error types for the Worldview domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Worldview operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Ingestion pipeline errors ---
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    // --- Belief engine errors ---
    #[error("Belief error: {0}")]
    Belief(#[from] BeliefError),

    // --- External service errors ---
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Axis already exists: {0}")]
    DuplicateAxis(String),

    #[error("Axis not found: {0}")]
    AxisNotFound(String),

    #[error("Corrupt record ({table}): {reason}")]
    Corrupt { table: String, reason: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Keyword extraction failed for item {item_id}: {reason}")]
    ExtractionFailed { item_id: String, reason: String },

    #[error("Scoring failed for item {item_id}: {reason}")]
    ScoringFailed { item_id: String, reason: String },

    #[error("Empty batch")]
    EmptyBatch,

    #[error("Persistence failed: {0}")]
    PersistFailed(String),
}

#[derive(Debug, Error)]
pub enum BeliefError {
    #[error("Unknown axis: {0}")]
    UnknownAxis(String),

    #[error("Evidence rejected for axis {axis_id}: validator confidence {confidence:.2} below threshold")]
    EvidenceRejected { axis_id: String, confidence: f64 },

    #[error("Malformed delta: {0}")]
    MalformedDelta(String),

    #[error("New-axis policy violated: {0}")]
    PolicyViolation(String),
}

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed service response: {0}")]
    MalformedResponse(String),
}
