//! Embedding-based redundancy scanning.
//!
//! Each axis is embedded from its canonical text (label plus both poles),
//! with the vector cached against a SHA-256 content hash so an unchanged
//! axis is never re-embedded. Highly similar pairs become merge proposals;
//! the scanner only proposes, it never merges.

use sha2::{Digest as _, Sha256};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use worldview_core::axis::{BeliefAxis, MergeProposal};
use worldview_core::error::Result;
use worldview_core::services::Embedder;
use worldview_core::store::AxisStore;
use worldview_config::BeliefConfig;

/// Hex SHA-256 of an axis's canonical text.
pub fn content_hash(axis: &BeliefAxis) -> String {
    let mut hasher = Sha256::new();
    hasher.update(axis.canonical_text().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cosine similarity of two vectors; 0.0 for mismatched lengths or a zero
/// norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Scans the axis set for semantically redundant pairs.
pub struct RedundancyScanner {
    store: Arc<dyn AxisStore>,
    embedder: Arc<dyn Embedder>,
    config: BeliefConfig,
}

impl RedundancyScanner {
    pub fn new(
        store: Arc<dyn AxisStore>,
        embedder: Arc<dyn Embedder>,
        config: BeliefConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Run one scan cycle. Axes whose embedding is unavailable this cycle
    /// are skipped; every proposed pair is backed by two present vectors.
    pub async fn scan(&self) -> Result<Vec<MergeProposal>> {
        let axes = self.store.list_axes().await?;

        let mut embedded: Vec<(BeliefAxis, Vec<f32>)> = Vec::with_capacity(axes.len());
        for axis in axes {
            // Absorbed axes live behind a redirect and are out of play.
            if self.store.resolve_redirect(&axis.id).await?.is_some() {
                continue;
            }
            match self.embedding_for(&axis).await? {
                Some(vector) => embedded.push((axis, vector)),
                None => warn!(axis_id = %axis.id, "No embedding available, skipping axis"),
            }
        }

        let mut proposals = Vec::new();
        for i in 0..embedded.len() {
            for j in (i + 1)..embedded.len() {
                let (a, va) = &embedded[i];
                let (b, vb) = &embedded[j];
                let similarity = cosine_similarity(va, vb);
                if similarity >= self.config.merge_threshold {
                    let proposal = MergeProposal {
                        axis_a: a.id.clone(),
                        axis_b: b.id.clone(),
                        similarity,
                        evidence_a: a.evidence.len() as u64,
                        evidence_b: b.evidence.len() as u64,
                        proposed_at: Utc::now(),
                    };
                    info!(
                        axis_a = %a.id,
                        axis_b = %b.id,
                        similarity,
                        "Redundant axis pair proposed"
                    );
                    self.store.append_merge_proposal(&proposal).await?;
                    proposals.push(proposal);
                }
            }
        }
        Ok(proposals)
    }

    async fn embedding_for(&self, axis: &BeliefAxis) -> Result<Option<Vec<f32>>> {
        let hash = content_hash(axis);
        if let Some(vector) = self.store.cached_embedding(&axis.id, &hash).await? {
            debug!(axis_id = %axis.id, "Embedding cache hit");
            return Ok(Some(vector));
        }

        match self.embedder.embed(&axis.canonical_text()).await {
            Ok(Some(vector)) => {
                self.store.put_embedding(&axis.id, &hash, &vector).await?;
                Ok(Some(vector))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(axis_id = %axis.id, error = %e, "Embedding request failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use worldview_core::error::ServiceError;
    use worldview_store::SqliteStore;

    /// Embedder stub: fixed vectors by text, with a call counter.
    #[derive(Default)]
    struct MapEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Embedder for MapEmbedder {
        async fn embed(
            &self,
            text: &str,
        ) -> std::result::Result<Option<Vec<f32>>, ServiceError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.vectors.get(text).cloned())
        }
    }

    fn axis(id: &str, label: &str) -> BeliefAxis {
        BeliefAxis {
            id: id.into(),
            label: label.into(),
            pole_left: "no".into(),
            pole_right: "yes".into(),
            score: 0.0,
            confidence: 0.0,
            topics: vec![],
            created_at: Utc::now(),
            last_updated: Utc::now(),
            evidence: vec![],
        }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn hash_tracks_canonical_text() {
        let a = axis("x", "first label");
        let b = axis("x", "second label");
        assert_ne!(content_hash(&a), content_hash(&b));
        assert_eq!(content_hash(&a), content_hash(&a.clone()));
    }

    async fn scanner(embedder: MapEmbedder) -> (RedundancyScanner, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open("sqlite::memory:").await.unwrap());
        let scanner = RedundancyScanner::new(
            store.clone(),
            Arc::new(embedder),
            BeliefConfig::default(),
        );
        (scanner, store)
    }

    #[tokio::test]
    async fn similar_pair_yields_one_proposal() {
        let a = axis("axis_a", "nuclear energy");
        let b = axis("axis_b", "atomic power");
        let c = axis("axis_c", "school lunches");

        let mut embedder = MapEmbedder::default();
        embedder.vectors.insert(a.canonical_text(), vec![1.0, 0.0, 0.1]);
        embedder.vectors.insert(b.canonical_text(), vec![1.0, 0.0, 0.12]);
        embedder.vectors.insert(c.canonical_text(), vec![0.0, 1.0, 0.0]);

        let (scanner, store) = scanner(embedder).await;
        for ax in [&a, &b, &c] {
            store.create_axis(ax).await.unwrap();
        }

        let proposals = scanner.scan().await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].axis_a, "axis_a");
        assert_eq!(proposals[0].axis_b, "axis_b");
        assert!(proposals[0].similarity >= 0.88);
    }

    #[tokio::test]
    async fn missing_embedding_never_appears_in_a_proposal() {
        let a = axis("axis_a", "nuclear energy");
        let b = axis("axis_b", "atomic power");

        // Only one axis embeds; the pair cannot be proposed.
        let mut embedder = MapEmbedder::default();
        embedder.vectors.insert(a.canonical_text(), vec![1.0, 0.0]);

        let (scanner, store) = scanner(embedder).await;
        store.create_axis(&a).await.unwrap();
        store.create_axis(&b).await.unwrap();

        let proposals = scanner.scan().await.unwrap();
        assert!(proposals.is_empty());
    }

    #[tokio::test]
    async fn cached_vector_skips_the_embedder() {
        let a = axis("axis_a", "nuclear energy");
        let embedder = Arc::new(MapEmbedder::default());
        let store = Arc::new(SqliteStore::open("sqlite::memory:").await.unwrap());
        let scanner = RedundancyScanner::new(
            store.clone(),
            embedder.clone(),
            BeliefConfig::default(),
        );

        store.create_axis(&a).await.unwrap();
        store
            .put_embedding("axis_a", &content_hash(&a), &[0.5, 0.5])
            .await
            .unwrap();

        scanner.scan().await.unwrap();
        assert_eq!(*embedder.calls.lock().unwrap(), 0);
    }
}
