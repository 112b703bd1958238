//! Belief axes, evidence logs, drift state, and merge proposals.
//!
//! An axis is a named belief dimension with two opposing poles. Its score and
//! confidence are always recomputed from the full evidence log; they are
//! derived values, never incrementally adjusted. Axes are never deleted:
//! merging records a redirect from the absorbed id to the surviving (oldest)
//! id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which pole a piece of evidence supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoleAlignment {
    Left,
    Right,
}

impl PoleAlignment {
    /// Signed direction: left = -1, right = +1.
    pub fn sign(self) -> f64 {
        match self {
            PoleAlignment::Left => -1.0,
            PoleAlignment::Right => 1.0,
        }
    }
}

impl std::fmt::Display for PoleAlignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoleAlignment::Left => write!(f, "left"),
            PoleAlignment::Right => write!(f, "right"),
        }
    }
}

/// A single validated observation supporting one pole of an axis.
/// Evidence logs are append-only; entries are never mutated or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEntry {
    /// Reference back to the originating item/source
    pub source: String,

    /// The observed text
    pub text: String,

    pub observed_at: DateTime<Utc>,

    /// Which pole this evidence supports
    pub alignment: PoleAlignment,

    /// Trust weight, normalized around 1.0 (clamped into [0.5, 2.0] at
    /// aggregation time)
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Confidence returned by the external stance validator, if it ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_confidence: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

/// A belief axis: a dimension of the model with two opposing poles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefAxis {
    /// Stable id, never reused
    pub id: String,

    /// Short human-readable label
    pub label: String,

    /// Description of the negative pole
    pub pole_left: String,

    /// Description of the positive pole
    pub pole_right: String,

    /// Weighted mean of evidence signs, in [-1, 1]
    #[serde(default)]
    pub score: f64,

    /// Grows with weighted evidence volume, capped below certainty, in [0, 1]
    #[serde(default)]
    pub confidence: f64,

    /// Topic tags
    #[serde(default)]
    pub topics: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,

    /// Ordered append-only evidence log
    #[serde(default)]
    pub evidence: Vec<EvidenceEntry>,
}

impl BeliefAxis {
    /// Canonical text used for embedding + cache invalidation:
    /// the label plus both pole descriptions.
    pub fn canonical_text(&self) -> String {
        format!("{} {} {}", self.label, self.pole_left, self.pole_right)
    }
}

/// Per-axis CUSUM accumulators, persisted across runs.
///
/// The processed-evidence count is the sole memory of how much of the
/// evidence log the detector has consumed. Both accumulators are kept >= 0;
/// only the side that alerted is reset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DriftState {
    /// Number of evidence entries already fed through the detector
    pub processed: u64,

    /// Accumulated positive (rightward) shift
    pub cusum_pos: f64,

    /// Accumulated negative (leftward) shift
    pub cusum_neg: f64,
}

/// Direction of a detected drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDirection {
    TowardRight,
    TowardLeft,
}

impl std::fmt::Display for DriftDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftDirection::TowardRight => write!(f, "toward_right"),
            DriftDirection::TowardLeft => write!(f, "toward_left"),
        }
    }
}

/// An append-only drift alert. Alerts are never retracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAlert {
    pub axis_id: String,
    pub direction: DriftDirection,

    /// The cumulative CUSUM value at the moment the threshold was crossed
    pub value: f64,

    /// Index into the evidence log of the entry that triggered the alert
    pub evidence_index: u64,

    pub detected_at: DateTime<Utc>,
}

/// A flagged pair of semantically redundant axes awaiting an external
/// consolidation decision. The detector never merges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeProposal {
    pub axis_a: String,
    pub axis_b: String,

    /// Cosine similarity of the two axis embeddings
    pub similarity: f64,

    /// Evidence counts at proposal time (tie-break hint: more evidence
    /// should usually survive)
    pub evidence_a: u64,
    pub evidence_b: u64,

    pub proposed_at: DateTime<Utc>,
}

/// A validated delta handed to the core by the external digest consumer.
/// The core only applies these; the judgment of *what* to create is external.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AxisDelta {
    /// Append an evidence entry to an existing axis
    Evidence {
        axis_id: String,
        entry: EvidenceEntry,
    },

    /// Create a new axis (subject to the duplicate-id check and the
    /// optional daily-cap policy)
    NewAxis { axis: BeliefAxis },
}

/// Verdict returned by the external stance validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StanceVerdict {
    /// Confidence that the claimed alignment is correct, in [0, 1]
    pub confidence: f64,

    /// Free-text reasoning from the validator
    #[serde(default)]
    pub reasoning: String,
}
