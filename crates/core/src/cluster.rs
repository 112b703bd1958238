//! Ephemeral per-cycle clusters and the digest handed to the consumer.

use crate::item::Item;
use serde::{Deserialize, Serialize};

/// A group of related items, recomputed each cycle. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// The highest-scoring member; defines the cluster for linkage
    pub representative: Item,

    /// Remaining members, score-descending
    pub members: Vec<Item>,

    /// Label derived from the representative's top keywords
    pub label: String,

    /// Whether this cluster's representative keywords intersect the
    /// current burst set
    pub bursting: bool,
}

impl Cluster {
    /// Total member count including the representative.
    pub fn len(&self) -> usize {
        1 + self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Score of the best member (always the representative).
    pub fn top_score(&self) -> f64 {
        self.representative.scores.total
    }
}

/// The compact output of one ingestion cycle: multi-member clusters ordered
/// by representative score descending, then singletons listed separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Digest {
    pub clusters: Vec<Cluster>,
    pub singletons: Vec<Item>,

    /// Keywords that more than doubled versus the previous window
    pub burst_keywords: Vec<String>,

    /// How many items were persisted this cycle
    pub persisted: usize,
}

impl Digest {
    /// Total items represented in the digest.
    pub fn item_count(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum::<usize>() + self.singletons.len()
    }
}
