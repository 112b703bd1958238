//! Evidence aggregation.
//!
//! Score and confidence are pure functions of the evidence log. An append
//! first passes the stance-validation gate, then recomputes both values
//! from the whole stored log and feeds the new entry's sign into the drift
//! detector.

use crate::drift;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use worldview_core::axis::{BeliefAxis, EvidenceEntry};
use worldview_core::error::{BeliefError, Result};
use worldview_core::services::StanceValidator;
use worldview_core::store::AxisStore;
use worldview_config::BeliefConfig;

/// Recompute `(score, confidence)` from a full evidence log.
///
/// `score = Σ wᵢ·signᵢ / Σ wᵢ` with each weight clamped into
/// `[floor, ceiling]`; `confidence = min(cap, Σ wᵢ · gain)`. An empty log
/// is `(0.0, 0.0)`.
pub fn recompute(log: &[EvidenceEntry], config: &BeliefConfig) -> (f64, f64) {
    if log.is_empty() {
        return (0.0, 0.0);
    }

    let mut weight_sum = 0.0;
    let mut signed_sum = 0.0;
    for entry in log {
        let w = entry.weight.clamp(config.weight_floor, config.weight_ceiling);
        weight_sum += w;
        signed_sum += w * entry.alignment.sign();
    }

    let score = signed_sum / weight_sum;
    let confidence = (weight_sum * config.confidence_gain).min(config.confidence_cap);
    (score, confidence)
}

/// Coordinates validation, the append, the recompute, and drift detection
/// for one axis store.
pub struct BeliefEngine {
    store: Arc<dyn AxisStore>,
    validator: Arc<dyn StanceValidator>,
    config: BeliefConfig,
}

impl BeliefEngine {
    pub fn new(
        store: Arc<dyn AxisStore>,
        validator: Arc<dyn StanceValidator>,
        config: BeliefConfig,
    ) -> Self {
        Self {
            store,
            validator,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn AxisStore> {
        &self.store
    }

    pub fn config(&self) -> &BeliefConfig {
        &self.config
    }

    /// Follow redirect records until a live axis id is reached. Repeated
    /// merges leave chains several hops long.
    pub(crate) async fn resolve_live_axis(&self, axis_id: &str) -> Result<String> {
        let mut current = axis_id.to_string();
        let mut visited = HashSet::new();
        while let Some(target) = self.store.resolve_redirect(&current).await? {
            if !visited.insert(current.clone()) {
                warn!(axis_id = %current, "Redirect cycle detected, stopping here");
                break;
            }
            current = target;
        }
        Ok(current)
    }

    /// Append one evidence entry to an axis.
    ///
    /// Text long enough to carry a real claim goes through the stance
    /// validator first; a confident contradiction rejects the entry, an
    /// unavailable validator lets it through unvalidated. On accept the
    /// axis's score and confidence are recomputed from the full stored log
    /// and the entry's sign advances the drift detector.
    pub async fn append_evidence(
        &self,
        axis_id: &str,
        mut entry: EvidenceEntry,
    ) -> Result<BeliefAxis> {
        // Evidence addressed to an absorbed axis follows the redirect
        // chain to the live survivor.
        let axis_id = self.resolve_live_axis(axis_id).await?;

        let axis = self
            .store
            .get_axis(&axis_id)
            .await?
            .ok_or_else(|| BeliefError::UnknownAxis(axis_id.clone()))?;

        if entry.text.len() > self.config.min_validation_len {
            match self
                .validator
                .validate(
                    &axis.label,
                    &axis.pole_left,
                    &axis.pole_right,
                    &entry.text,
                    entry.alignment,
                )
                .await
            {
                Ok(Some(verdict)) => {
                    if verdict.confidence < self.config.min_verdict_confidence {
                        info!(
                            axis_id = %axis_id,
                            confidence = verdict.confidence,
                            reasoning = %verdict.reasoning,
                            "Evidence rejected by stance validator"
                        );
                        return Err(BeliefError::EvidenceRejected {
                            axis_id,
                            confidence: verdict.confidence,
                        }
                        .into());
                    }
                    entry.validator_confidence = Some(verdict.confidence);
                }
                Ok(None) => {
                    warn!(axis_id = %axis_id, "Stance validator unavailable, accepting unvalidated");
                }
                Err(e) => {
                    warn!(axis_id = %axis_id, error = %e, "Stance validator failed, accepting unvalidated");
                }
            }
        }

        let sign = entry.alignment.sign();
        self.store.append_evidence(&axis_id, &entry).await?;

        // Recompute from the full stored log, never from the in-memory copy.
        let updated = self
            .store
            .get_axis(&axis_id)
            .await?
            .ok_or_else(|| BeliefError::UnknownAxis(axis_id.clone()))?;
        let (score, confidence) = recompute(&updated.evidence, &self.config);
        let now = Utc::now();
        self.store
            .update_axis_scores(&axis_id, score, confidence, now)
            .await?;
        debug!(axis_id = %axis_id, score, confidence, evidence = updated.evidence.len(),
            "Axis recomputed");

        drift::observe(
            self.store.as_ref(),
            &axis_id,
            sign,
            updated.evidence.len() as u64,
            &self.config,
        )
        .await?;

        self.store
            .get_axis(&axis_id)
            .await?
            .ok_or_else(|| BeliefError::UnknownAxis(axis_id).into())
    }
}
