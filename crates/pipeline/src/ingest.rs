//! The ingestion cycle orchestrator.
//!
//! One `run` is a single-writer batch: seen-filtering, keyword extraction,
//! scoring, dedup, top-K selection, corpus novelty, clustering, burst
//! tagging, persistence, digest. Every step is idempotent by item id, and a
//! single item's failure is logged and skipped without aborting the batch.

use crate::{cluster, dedup, keywords, scoring};
use chrono::{Duration, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};
use worldview_core::axis::BeliefAxis;
use worldview_core::cluster::Digest;
use worldview_core::error::PipelineError;
use worldview_core::item::{Item, RawItem};
use worldview_core::services::ReputationProvider;
use worldview_core::store::ItemStore;
use worldview_config::PipelineConfig;

/// Bounded rolling set of already-seen item ids, oldest evicted first.
struct SeenSet {
    order: VecDeque<String>,
    set: HashSet<String>,
    capacity: usize,
}

impl SeenSet {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            set: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.set.contains(id)
    }

    fn insert(&mut self, id: String) {
        if self.set.insert(id.clone()) {
            self.order.push_back(id);
            while self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.set.remove(&evicted);
                }
            }
        }
    }
}

/// The ingestion pipeline. One instance per feed; `run` executes one cycle
/// to completion before the next may start.
pub struct IngestPipeline {
    store: Arc<dyn ItemStore>,
    reputation: Arc<dyn ReputationProvider>,
    config: PipelineConfig,
    seen: SeenSet,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn ItemStore>,
        reputation: Arc<dyn ReputationProvider>,
        config: PipelineConfig,
    ) -> Self {
        let seen = SeenSet::new(config.seen_capacity);
        Self {
            store,
            reputation,
            config,
            seen,
        }
    }

    /// Run one ingestion cycle over a bounded batch.
    ///
    /// `axes` feed the topical-alignment score; the pipeline never touches
    /// the axis store itself, so a failing belief side cannot stop
    /// ingestion.
    pub async fn run(
        &mut self,
        batch: Vec<RawItem>,
        axes: &[BeliefAxis],
    ) -> Result<Digest, PipelineError> {
        let now = Utc::now();
        let incoming = batch.len();

        // 1. Drop items already seen this window.
        let fresh: Vec<RawItem> = batch
            .into_iter()
            .filter(|raw| !self.seen.contains(&raw.id))
            .collect();
        debug!(incoming, fresh = fresh.len(), "Ingestion cycle started");

        // 2 + 3. Extract keywords and score, isolating per-item failures.
        let mut scored: Vec<Item> = Vec::with_capacity(fresh.len());
        for raw in fresh {
            match self.prepare_item(raw, axes, now) {
                Ok(item) => {
                    self.seen.insert(item.id.clone());
                    scored.push(item);
                }
                Err(e) => warn!(error = %e, "Skipping item"),
            }
        }

        if scored.is_empty() {
            info!("Ingestion cycle produced no new items");
            return Ok(Digest::default());
        }

        // 4. Near-duplicate removal, best scorer first.
        scoring::sort_by_score(&mut scored);
        let before_dedup = scored.len();
        let mut selected = dedup::dedup(scored, self.config.dedup_threshold);
        debug!(
            removed = before_dedup - selected.len(),
            kept = selected.len(),
            "Dedup complete"
        );

        // 5. First top-K cut.
        selected.truncate(self.config.top_k);

        // 6 + 7. Corpus novelty over the survivors, then re-select.
        scoring::apply_novelty(&mut selected, &self.config);
        scoring::sort_by_score(&mut selected);
        selected.truncate(self.config.top_k);

        // 8. Cluster and tag bursts. The baseline is everything persisted
        // inside the window before this batch, so a keyword that already
        // burst does not re-flag on the next cycle.
        let current = cluster::batch_keyword_frequencies(&selected);
        let window = Duration::hours(self.config.burst_window_hours);
        let previous = match self.store.keyword_frequencies(now - window, now).await {
            Ok(freqs) => freqs,
            Err(e) => {
                // Burst tagging degrades to "nothing bursts" this cycle.
                warn!(error = %e, "Previous-window keyword query failed");
                Default::default()
            }
        };
        let bursts = cluster::burst_keywords(&current, &previous);
        let mut clusters = cluster::cluster_items(selected, self.config.cluster_threshold);
        cluster::tag_bursts(&mut clusters, &bursts);

        // 9. Persist and emit the digest.
        let mut persisted = 0usize;
        for item in clusters
            .iter()
            .flat_map(|c| std::iter::once(&c.representative).chain(c.members.iter()))
        {
            match self.store.upsert_item(item).await {
                Ok(()) => persisted += 1,
                Err(e) => warn!(item_id = %item.id, error = %e, "Persist failed"),
            }
        }

        let (multi, single): (Vec<_>, Vec<_>) =
            clusters.into_iter().partition(|c| !c.members.is_empty());
        let singletons: Vec<Item> = single.into_iter().map(|c| c.representative).collect();

        let mut burst_keywords: Vec<String> = bursts.into_iter().collect();
        burst_keywords.sort();

        info!(
            clusters = multi.len(),
            singletons = singletons.len(),
            persisted,
            bursts = burst_keywords.len(),
            "Ingestion cycle complete"
        );

        Ok(Digest {
            clusters: multi,
            singletons,
            burst_keywords,
            persisted,
        })
    }

    fn prepare_item(
        &self,
        raw: RawItem,
        axes: &[BeliefAxis],
        now: chrono::DateTime<Utc>,
    ) -> Result<Item, PipelineError> {
        if raw.text.trim().is_empty() {
            return Err(PipelineError::ExtractionFailed {
                item_id: raw.id,
                reason: "empty text".into(),
            });
        }

        let mut item = Item::from_raw(raw);
        item.keywords = keywords::extract(&item.text, self.config.max_keywords);

        let reputation = self.reputation.reputation(&item.source_id);
        scoring::score_item(&mut item, axes, reputation, now, &self.config);
        Ok(item)
    }
}
