//! Persistence traits — the item table plus keyword index, and the
//! belief-axis store with its append-only logs.
//!
//! Implementations: SQLite (production), in-memory stubs in tests.
//! The store supports one concurrent writer; readers see each item row
//! together with its keyword-index rows as one atomic unit.

use crate::axis::{BeliefAxis, DriftAlert, DriftState, EvidenceEntry, MergeProposal};
use crate::error::StoreError;
use crate::item::Item;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Durable storage for scored items and their keyword index.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Upsert an item together with its keyword-index rows, atomically.
    /// Re-observation of the same id replaces both as a unit.
    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError>;

    /// Fetch a single item by id.
    async fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError>;

    /// Most recent items, newest first.
    async fn recent_items(&self, limit: usize) -> Result<Vec<Item>, StoreError>;

    /// Full-text search over item text, best match first.
    async fn search_items(&self, query: &str, limit: usize) -> Result<Vec<Item>, StoreError>;

    /// Keyword -> distinct-item frequency over a half-open time window
    /// `[since, until)`. Feeds burst detection's previous-window map.
    async fn keyword_frequencies(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashMap<String, u64>, StoreError>;

    /// Total persisted item count.
    async fn item_count(&self) -> Result<u64, StoreError>;
}

/// Durable storage for belief axes.
///
/// Evidence logs, drift alerts, and merge proposals are append-only. The
/// only in-place updates are an axis's score/confidence/last_updated, and
/// only through [`update_axis_scores`](AxisStore::update_axis_scores).
#[async_trait]
pub trait AxisStore: Send + Sync {
    /// Create a new axis. A duplicate id is rejected with
    /// [`StoreError::DuplicateAxis`] and the existing axis is left untouched.
    async fn create_axis(&self, axis: &BeliefAxis) -> Result<(), StoreError>;

    /// Fetch an axis with its full evidence log.
    async fn get_axis(&self, id: &str) -> Result<Option<BeliefAxis>, StoreError>;

    /// All axes with their evidence logs, oldest first.
    async fn list_axes(&self) -> Result<Vec<BeliefAxis>, StoreError>;

    /// Append one evidence entry to an axis's log.
    async fn append_evidence(
        &self,
        axis_id: &str,
        entry: &EvidenceEntry,
    ) -> Result<(), StoreError>;

    /// Write back recomputed score/confidence and bump last_updated.
    async fn update_axis_scores(
        &self,
        axis_id: &str,
        score: f64,
        confidence: f64,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Load the persisted CUSUM state for an axis (zeroed if absent).
    async fn drift_state(&self, axis_id: &str) -> Result<DriftState, StoreError>;

    /// Persist CUSUM state.
    async fn save_drift_state(&self, axis_id: &str, state: &DriftState)
    -> Result<(), StoreError>;

    /// Append to the drift-alert log.
    async fn append_drift_alert(&self, alert: &DriftAlert) -> Result<(), StoreError>;

    /// All recorded drift alerts, oldest first.
    async fn list_drift_alerts(&self) -> Result<Vec<DriftAlert>, StoreError>;

    /// Append to the merge-proposal log.
    async fn append_merge_proposal(&self, proposal: &MergeProposal) -> Result<(), StoreError>;

    /// Record that `absorbed_id` was merged into `target_id`.
    async fn record_redirect(&self, absorbed_id: &str, target_id: &str)
    -> Result<(), StoreError>;

    /// Follow a redirect, if one exists for this id.
    async fn resolve_redirect(&self, id: &str) -> Result<Option<String>, StoreError>;

    /// Cached embedding for an axis, valid only if the stored content hash
    /// matches (an edited label/pole reads as a miss).
    async fn cached_embedding(
        &self,
        axis_id: &str,
        content_hash: &str,
    ) -> Result<Option<Vec<f32>>, StoreError>;

    /// Store/replace the cached embedding for an axis.
    async fn put_embedding(
        &self,
        axis_id: &str,
        content_hash: &str,
        vector: &[f32],
    ) -> Result<(), StoreError>;

    /// Axes created within `[since, until)` — used by the daily-cap policy.
    async fn axes_created_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}
