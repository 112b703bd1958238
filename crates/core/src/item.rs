//! Feed items and their derived scores.
//!
//! A `RawItem` is what the feed hands us: opaque id, authoritative timestamp,
//! source identity, text, engagement counters. The pipeline turns it into an
//! `Item` by attaching extracted keywords and composite scores. Items are
//! immutable once scored; re-observing the same id is an upsert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An incoming item as supplied by the raw feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    /// Opaque stable id from the feed
    pub id: String,

    /// Authoritative timestamp for recency scoring
    pub created_at: DateTime<Utc>,

    /// Source identity (account, handle, channel)
    pub source_id: String,

    /// Raw text content
    pub text: String,

    /// Aggregate engagement count (likes + replies + shares)
    #[serde(default)]
    pub engagement: u64,

    /// Parent reference (reply/quote), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Composite relevance scores for an item.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ItemScores {
    /// Engagement over a super-linear recency decay
    pub velocity: f64,

    /// Source reputation, clamped [0, 10]
    pub trust: f64,

    /// Count of axis-label words literally present in the text
    pub alignment: f64,

    /// Mean corpus-IDF of the item's keywords, capped (0 until step 6)
    pub novelty: f64,

    /// velocity + trust*w_t + alignment*w_a (+ novelty*w_n once computed)
    pub total: f64,
}

/// A scored item as persisted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub source_id: String,
    pub text: String,
    pub engagement: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Ranked keyphrases extracted from the text
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub scores: ItemScores,
}

impl Item {
    /// Build an unscored item from a raw feed item.
    pub fn from_raw(raw: RawItem) -> Self {
        Self {
            id: raw.id,
            created_at: raw.created_at,
            source_id: raw.source_id,
            text: raw.text,
            engagement: raw.engagement,
            parent_id: raw.parent_id,
            keywords: Vec::new(),
            scores: ItemScores::default(),
        }
    }
}

/// One row of the keyword index: supports frequency and aggregate queries
/// over time windows (burst detection reads the previous window from here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    pub item_id: String,
    pub score: f64,
    pub observed_at: DateTime<Utc>,
}
