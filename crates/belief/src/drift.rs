//! CUSUM drift detection over evidence signs.
//!
//! Each axis carries two persisted accumulators. A rightward entry (+1)
//! pushes the positive side up, a leftward entry (-1) pushes the negative
//! side up, and the slack `k` bleeds both toward zero. A side reaching the
//! threshold emits a directional alert and resets only itself; the other
//! side keeps its accumulated value.

use chrono::Utc;
use tracing::{debug, info};
use worldview_core::axis::{DriftAlert, DriftDirection, DriftState};
use worldview_core::error::Result;
use worldview_core::store::AxisStore;
use worldview_config::BeliefConfig;

/// Advance both accumulators by one evidence sign. Returns the side that
/// crossed `threshold`, if any, without resetting it.
pub fn step(state: &mut DriftState, sign: f64, slack: f64, threshold: f64) -> Option<DriftDirection> {
    state.processed += 1;
    state.cusum_pos = (state.cusum_pos + sign - slack).max(0.0);
    state.cusum_neg = (state.cusum_neg - sign - slack).max(0.0);

    if state.cusum_pos >= threshold {
        Some(DriftDirection::TowardRight)
    } else if state.cusum_neg >= threshold {
        Some(DriftDirection::TowardLeft)
    } else {
        None
    }
}

/// Feed one new evidence sign through an axis's persisted drift state.
///
/// Axes with fewer than `min_drift_evidence` total entries advance their
/// accumulators but never alert. On an alert, only the triggering side is
/// reset to zero before the state is saved.
pub async fn observe(
    store: &dyn AxisStore,
    axis_id: &str,
    sign: f64,
    evidence_count: u64,
    config: &BeliefConfig,
) -> Result<()> {
    let mut state = store.drift_state(axis_id).await?;
    let crossed = step(
        &mut state,
        sign,
        config.cusum_slack,
        config.cusum_threshold,
    );

    if let Some(direction) = crossed {
        if evidence_count >= config.min_drift_evidence {
            let value = match direction {
                DriftDirection::TowardRight => state.cusum_pos,
                DriftDirection::TowardLeft => state.cusum_neg,
            };
            let alert = DriftAlert {
                axis_id: axis_id.to_string(),
                direction,
                value,
                evidence_index: state.processed,
                detected_at: Utc::now(),
            };
            info!(axis_id, direction = %direction, value, "Drift detected");
            store.append_drift_alert(&alert).await?;

            match direction {
                DriftDirection::TowardRight => state.cusum_pos = 0.0,
                DriftDirection::TowardLeft => state.cusum_neg = 0.0,
            }
        } else {
            debug!(
                axis_id,
                evidence_count, "Accumulator crossed threshold below evidence minimum"
            );
        }
    }

    store.save_drift_state(axis_id, &state).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use worldview_core::axis::BeliefAxis;
    use worldview_store::SqliteStore;

    #[test]
    fn accumulators_never_go_negative() {
        let mut state = DriftState::default();
        for _ in 0..20 {
            step(&mut state, -1.0, 0.5, 4.0);
            assert!(state.cusum_pos >= 0.0);
        }
        assert_eq!(state.cusum_pos, 0.0);
        assert!(state.cusum_neg > 0.0);
    }

    #[test]
    fn eight_rightward_entries_cross_at_the_eighth() {
        // Unit-weight rightward run: each step adds 1 - 0.5 = 0.5, so the
        // positive side reaches 4.0 exactly on entry eight.
        let mut state = DriftState::default();
        for i in 1..=7 {
            assert!(step(&mut state, 1.0, 0.5, 4.0).is_none(), "entry {i}");
        }
        let crossed = step(&mut state, 1.0, 0.5, 4.0);
        assert_eq!(crossed, Some(DriftDirection::TowardRight));
        assert!((state.cusum_pos - 4.0).abs() < 1e-12);
        assert_eq!(state.processed, 8);
    }

    #[test]
    fn alternating_signs_never_alert() {
        let mut state = DriftState::default();
        for i in 0..100 {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            assert!(step(&mut state, sign, 0.5, 4.0).is_none());
        }
    }

    fn axis(id: &str) -> BeliefAxis {
        BeliefAxis {
            id: id.into(),
            label: "remote work".into(),
            pole_left: "offices matter".into(),
            pole_right: "remote is the future".into(),
            score: 0.0,
            confidence: 0.0,
            topics: vec![],
            created_at: Utc::now(),
            last_updated: Utc::now(),
            evidence: vec![],
        }
    }

    #[tokio::test]
    async fn alert_is_persisted_and_only_one_side_resets() {
        let store = Arc::new(SqliteStore::open("sqlite::memory:").await.unwrap());
        store.create_axis(&axis("axis_remote")).await.unwrap();
        let config = BeliefConfig::default();

        for i in 1..=8u64 {
            observe(store.as_ref(), "axis_remote", 1.0, i, &config)
                .await
                .unwrap();
        }

        let alerts = store.list_drift_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].direction, DriftDirection::TowardRight);
        assert_eq!(alerts[0].evidence_index, 8);
        assert!((alerts[0].value - 4.0).abs() < 1e-12);

        let state = store.drift_state("axis_remote").await.unwrap();
        assert_eq!(state.cusum_pos, 0.0);
        assert_eq!(state.processed, 8);
    }

    #[tokio::test]
    async fn below_evidence_minimum_advances_without_alerting() {
        let store = Arc::new(SqliteStore::open("sqlite::memory:").await.unwrap());
        store.create_axis(&axis("axis_remote")).await.unwrap();
        let config = BeliefConfig::default();

        // Evidence count pinned below the minimum: the accumulator may
        // cross but no alert is recorded.
        for _ in 0..10 {
            observe(store.as_ref(), "axis_remote", 1.0, 2, &config)
                .await
                .unwrap();
        }

        assert!(store.list_drift_alerts().await.unwrap().is_empty());
        let state = store.drift_state("axis_remote").await.unwrap();
        assert!(state.cusum_pos >= config.cusum_threshold);
        assert_eq!(state.processed, 10);
    }
}
