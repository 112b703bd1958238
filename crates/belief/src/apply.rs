//! Application of externally produced deltas and merge decisions.
//!
//! Delta batches are best-effort: a malformed record, an unknown axis, a
//! rejected entry, or a policy violation skips that record and continues.
//! Only a failing axis store aborts the batch.

use crate::aggregate::{recompute, BeliefEngine};
use crate::drift;
use chrono::{Duration, Utc};
use tracing::{info, warn};
use worldview_core::axis::{AxisDelta, BeliefAxis};
use worldview_core::error::{BeliefError, Error, Result, StoreError};

/// Outcome counts for one delta batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: usize,
}

impl BeliefEngine {
    /// Apply a batch of external deltas, skipping bad records.
    pub async fn apply_deltas(&self, deltas: Vec<AxisDelta>) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        for delta in deltas {
            match self.apply_delta(delta).await {
                Ok(()) => report.applied += 1,
                Err(Error::Belief(e)) => {
                    warn!(error = %e, "Skipping delta");
                    report.skipped += 1;
                }
                Err(Error::Store(StoreError::DuplicateAxis(id))) => {
                    warn!(axis_id = %id, "Skipping duplicate new-axis delta");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(applied = report.applied, skipped = report.skipped, "Delta batch applied");
        Ok(report)
    }

    async fn apply_delta(&self, delta: AxisDelta) -> Result<()> {
        match delta {
            AxisDelta::Evidence { axis_id, entry } => {
                if axis_id.is_empty() {
                    return Err(BeliefError::MalformedDelta("empty axis_id".into()).into());
                }
                if entry.text.trim().is_empty() {
                    return Err(BeliefError::MalformedDelta("empty evidence text".into()).into());
                }
                self.append_evidence(&axis_id, entry).await?;
                Ok(())
            }
            AxisDelta::NewAxis { axis } => self.create_axis(axis).await,
        }
    }

    /// Create a new axis, subject to the per-UTC-day cap.
    pub async fn create_axis(&self, axis: BeliefAxis) -> Result<()> {
        if axis.id.is_empty() || axis.label.is_empty() {
            return Err(BeliefError::MalformedDelta("new axis missing id or label".into()).into());
        }

        // A cap of zero disables the limit.
        let cap = self.config().max_new_axes_per_day;
        if cap > 0 {
            let day_start = Utc::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .unwrap_or_default()
                .and_utc();
            let created_today = self
                .store()
                .axes_created_between(day_start, day_start + Duration::days(1))
                .await?;
            if created_today >= cap {
                return Err(BeliefError::PolicyViolation(format!(
                    "daily new-axis cap of {cap} reached"
                ))
                .into());
            }
        }

        self.store().create_axis(&axis).await?;
        info!(axis_id = %axis.id, label = %axis.label, "Axis created");
        Ok(())
    }

    /// Merge two axes following an external consolidation decision.
    ///
    /// The earlier-created axis survives (ties break to the lexically
    /// smaller id). The absorbed axis's evidence is appended to the
    /// survivor, the survivor is recomputed, and a redirect is recorded;
    /// the absorbed row itself is never deleted.
    pub async fn apply_merge(&self, id_a: &str, id_b: &str) -> Result<String> {
        let id_a = self.resolve_live_axis(id_a).await?;
        let id_b = self.resolve_live_axis(id_b).await?;
        if id_a == id_b {
            return Err(BeliefError::MalformedDelta(format!(
                "both merge endpoints resolve to {id_a}"
            ))
            .into());
        }
        let a = self.require_axis(&id_a).await?;
        let b = self.require_axis(&id_b).await?;

        let (survivor, absorbed) = if a.created_at < b.created_at {
            (a, b)
        } else if b.created_at < a.created_at {
            (b, a)
        } else if a.id <= b.id {
            (a, b)
        } else {
            (b, a)
        };

        // Merged entries advance the survivor's drift detector too, so
        // later alert indices line up with the evidence log.
        let mut evidence_len = survivor.evidence.len() as u64;
        for entry in &absorbed.evidence {
            self.store().append_evidence(&survivor.id, entry).await?;
            evidence_len += 1;
            drift::observe(
                self.store().as_ref(),
                &survivor.id,
                entry.alignment.sign(),
                evidence_len,
                self.config(),
            )
            .await?;
        }

        let merged = self.require_axis(&survivor.id).await?;
        let (score, confidence) = recompute(&merged.evidence, self.config());
        self.store()
            .update_axis_scores(&survivor.id, score, confidence, Utc::now())
            .await?;

        self.store()
            .record_redirect(&absorbed.id, &survivor.id)
            .await?;
        info!(
            survivor = %survivor.id,
            absorbed = %absorbed.id,
            evidence = merged.evidence.len(),
            "Axes merged"
        );
        Ok(survivor.id)
    }

    async fn require_axis(&self, id: &str) -> Result<BeliefAxis> {
        self.store()
            .get_axis(id)
            .await?
            .ok_or_else(|| BeliefError::UnknownAxis(id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use worldview_core::axis::{EvidenceEntry, PoleAlignment, StanceVerdict};
    use worldview_core::error::ServiceError;
    use worldview_core::services::StanceValidator;
    use worldview_core::store::AxisStore;
    use worldview_config::BeliefConfig;
    use worldview_store::SqliteStore;

    struct NullValidator;

    #[async_trait]
    impl StanceValidator for NullValidator {
        async fn validate(
            &self,
            _axis_label: &str,
            _pole_left: &str,
            _pole_right: &str,
            _evidence_text: &str,
            _claimed: PoleAlignment,
        ) -> std::result::Result<Option<StanceVerdict>, ServiceError> {
            Ok(None)
        }
    }

    fn axis(id: &str, created_offset_hours: i64) -> BeliefAxis {
        let t = Utc::now() - Duration::hours(created_offset_hours);
        BeliefAxis {
            id: id.into(),
            label: format!("label for {id}"),
            pole_left: "no".into(),
            pole_right: "yes".into(),
            score: 0.0,
            confidence: 0.0,
            topics: vec![],
            created_at: t,
            last_updated: t,
            evidence: vec![],
        }
    }

    fn entry(text: &str, alignment: PoleAlignment) -> EvidenceEntry {
        EvidenceEntry {
            source: "t1".into(),
            text: text.into(),
            observed_at: Utc::now(),
            alignment,
            weight: 1.0,
            validator_confidence: None,
        }
    }

    async fn engine_with(config: BeliefConfig) -> (BeliefEngine, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open("sqlite::memory:").await.unwrap());
        let engine = BeliefEngine::new(store.clone(), Arc::new(NullValidator), config);
        (engine, store)
    }

    #[tokio::test]
    async fn bad_records_skip_good_records_apply() {
        let (engine, store) = engine_with(BeliefConfig::default()).await;
        store.create_axis(&axis("axis_a", 0)).await.unwrap();

        let report = engine
            .apply_deltas(vec![
                AxisDelta::Evidence {
                    axis_id: "axis_a".into(),
                    entry: entry("supports yes", PoleAlignment::Right),
                },
                AxisDelta::Evidence {
                    axis_id: "axis_missing".into(),
                    entry: entry("orphaned", PoleAlignment::Left),
                },
                AxisDelta::Evidence {
                    axis_id: "".into(),
                    entry: entry("no destination", PoleAlignment::Left),
                },
                AxisDelta::NewAxis { axis: axis("axis_b", 0) },
            ])
            .await
            .unwrap();

        assert_eq!(report, ApplyReport { applied: 2, skipped: 2 });
        let a = store.get_axis("axis_a").await.unwrap().unwrap();
        assert_eq!(a.evidence.len(), 1);
        assert!(store.get_axis("axis_b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_new_axis_leaves_existing_untouched() {
        let (engine, store) = engine_with(BeliefConfig::default()).await;
        store.create_axis(&axis("axis_a", 0)).await.unwrap();

        let mut imposter = axis("axis_a", 0);
        imposter.label = "a different label".into();
        let report = engine
            .apply_deltas(vec![AxisDelta::NewAxis { axis: imposter }])
            .await
            .unwrap();

        assert_eq!(report, ApplyReport { applied: 0, skipped: 1 });
        let stored = store.get_axis("axis_a").await.unwrap().unwrap();
        assert_eq!(stored.label, "label for axis_a");
    }

    #[tokio::test]
    async fn daily_cap_limits_new_axes() {
        let mut config = BeliefConfig::default();
        config.max_new_axes_per_day = 1;
        let (engine, _) = engine_with(config).await;

        let report = engine
            .apply_deltas(vec![
                AxisDelta::NewAxis { axis: axis("axis_a", 0) },
                AxisDelta::NewAxis { axis: axis("axis_b", 0) },
            ])
            .await
            .unwrap();

        assert_eq!(report, ApplyReport { applied: 1, skipped: 1 });
    }

    #[tokio::test]
    async fn merge_keeps_older_axis_and_redirects() {
        let (engine, store) = engine_with(BeliefConfig::default()).await;
        store.create_axis(&axis("axis_old", 48)).await.unwrap();
        store.create_axis(&axis("axis_new", 1)).await.unwrap();
        store
            .append_evidence("axis_old", &entry("old view", PoleAlignment::Left))
            .await
            .unwrap();
        store
            .append_evidence("axis_new", &entry("new view", PoleAlignment::Right))
            .await
            .unwrap();

        let survivor = engine.apply_merge("axis_new", "axis_old").await.unwrap();
        assert_eq!(survivor, "axis_old");

        let merged = store.get_axis("axis_old").await.unwrap().unwrap();
        assert_eq!(merged.evidence.len(), 2);
        assert_eq!(merged.score, 0.0);
        assert!((merged.confidence - 0.05).abs() < 1e-12);

        assert_eq!(
            store.resolve_redirect("axis_new").await.unwrap(),
            Some("axis_old".into())
        );
        // Absorbed row is retained behind the redirect.
        assert!(store.get_axis("axis_new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn merge_tie_breaks_to_lexically_smaller_id() {
        let (engine, store) = engine_with(BeliefConfig::default()).await;
        let t = Utc::now();
        let mut a = axis("axis_b", 0);
        a.created_at = t;
        let mut b = axis("axis_a", 0);
        b.created_at = t;
        store.create_axis(&a).await.unwrap();
        store.create_axis(&b).await.unwrap();

        let survivor = engine.apply_merge("axis_b", "axis_a").await.unwrap();
        assert_eq!(survivor, "axis_a");
    }

    #[tokio::test]
    async fn zero_cap_disables_the_daily_limit() {
        let mut config = BeliefConfig::default();
        config.max_new_axes_per_day = 0;
        let (engine, store) = engine_with(config).await;

        let report = engine
            .apply_deltas(vec![
                AxisDelta::NewAxis { axis: axis("axis_a", 0) },
                AxisDelta::NewAxis { axis: axis("axis_b", 0) },
                AxisDelta::NewAxis { axis: axis("axis_c", 0) },
                AxisDelta::NewAxis { axis: axis("axis_d", 0) },
            ])
            .await
            .unwrap();

        assert_eq!(report, ApplyReport { applied: 4, skipped: 0 });
        assert_eq!(store.list_axes().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn merged_evidence_advances_the_drift_detector() {
        let (engine, store) = engine_with(BeliefConfig::default()).await;
        store.create_axis(&axis("axis_old", 48)).await.unwrap();
        store.create_axis(&axis("axis_new", 1)).await.unwrap();
        store
            .append_evidence("axis_new", &entry("one", PoleAlignment::Right))
            .await
            .unwrap();
        store
            .append_evidence("axis_new", &entry("two", PoleAlignment::Right))
            .await
            .unwrap();

        engine.apply_merge("axis_old", "axis_new").await.unwrap();

        let state = store.drift_state("axis_old").await.unwrap();
        assert_eq!(state.processed, 2);
        assert!((state.cusum_pos - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn chained_merges_route_evidence_to_the_live_survivor() {
        let (engine, store) = engine_with(BeliefConfig::default()).await;
        store.create_axis(&axis("axis_a", 72)).await.unwrap();
        store.create_axis(&axis("axis_b", 48)).await.unwrap();
        store.create_axis(&axis("axis_c", 1)).await.unwrap();

        assert_eq!(engine.apply_merge("axis_c", "axis_b").await.unwrap(), "axis_b");
        assert_eq!(engine.apply_merge("axis_b", "axis_a").await.unwrap(), "axis_a");

        // Two hops: axis_c redirects to axis_b, which redirects to axis_a.
        engine
            .append_evidence("axis_c", entry("late arrival", PoleAlignment::Right))
            .await
            .unwrap();

        let live = store.get_axis("axis_a").await.unwrap().unwrap();
        assert_eq!(live.evidence.len(), 1);
        let absorbed = store.get_axis("axis_b").await.unwrap().unwrap();
        assert!(absorbed.evidence.is_empty());
    }

    #[tokio::test]
    async fn merging_already_merged_endpoints_is_rejected() {
        let (engine, store) = engine_with(BeliefConfig::default()).await;
        store.create_axis(&axis("axis_old", 48)).await.unwrap();
        store.create_axis(&axis("axis_new", 1)).await.unwrap();
        engine.apply_merge("axis_old", "axis_new").await.unwrap();

        let err = engine.apply_merge("axis_old", "axis_new").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Belief(BeliefError::MalformedDelta(_))
        ));
        let survivor = store.get_axis("axis_old").await.unwrap().unwrap();
        assert!(survivor.evidence.is_empty());
    }

    #[tokio::test]
    async fn evidence_for_absorbed_axis_follows_redirect() {
        let (engine, store) = engine_with(BeliefConfig::default()).await;
        store.create_axis(&axis("axis_old", 48)).await.unwrap();
        store.create_axis(&axis("axis_new", 1)).await.unwrap();
        engine.apply_merge("axis_old", "axis_new").await.unwrap();

        engine
            .append_evidence("axis_new", entry("late arrival", PoleAlignment::Right))
            .await
            .unwrap();

        let survivor = store.get_axis("axis_old").await.unwrap().unwrap();
        assert_eq!(survivor.evidence.len(), 1);
    }
}
