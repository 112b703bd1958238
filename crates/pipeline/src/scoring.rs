//! Composite relevance scoring.
//!
//! `total = velocity + trust*w_t + alignment*w_a`, with `novelty*w_n` added
//! once the selected batch is known (novelty is a corpus-relative measure,
//! so it is computed in a second pass over the survivors).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use worldview_core::axis::BeliefAxis;
use worldview_core::item::Item;
use worldview_config::PipelineConfig;

/// Engagement over a super-linear recency decay:
/// `engagement / (age_hours + 2)^exponent`.
pub fn velocity(engagement: u64, created_at: DateTime<Utc>, now: DateTime<Utc>, exponent: f64) -> f64 {
    let age_hours = (now - created_at).num_seconds().max(0) as f64 / 3600.0;
    engagement as f64 / (age_hours + 2.0).powf(exponent)
}

/// Source reputation clamped into [0, 10]; unknown sources score 0.
pub fn trust(reputation: Option<f64>) -> f64 {
    reputation.unwrap_or(0.0).clamp(0.0, 10.0)
}

/// Count of axis-label words (longer than 3 chars) literally present in the
/// item text. Summed over all axes, so an item touching several tracked
/// dimensions scores higher.
pub fn alignment(text: &str, axes: &[BeliefAxis]) -> f64 {
    let text_lc = text.to_lowercase();
    let mut hits = 0u64;
    for axis in axes {
        for word in axis.label.split_whitespace() {
            let word_lc = word.to_lowercase();
            if word_lc.len() > 3 && text_lc.contains(&word_lc) {
                hits += 1;
            }
        }
    }
    hits as f64
}

/// Fill in velocity/trust/alignment and the pre-novelty total.
pub fn score_item(
    item: &mut Item,
    axes: &[BeliefAxis],
    reputation: Option<f64>,
    now: DateTime<Utc>,
    config: &PipelineConfig,
) {
    item.scores.velocity = velocity(item.engagement, item.created_at, now, config.velocity_exponent);
    item.scores.trust = trust(reputation);
    item.scores.alignment = alignment(&item.text, axes);
    item.scores.novelty = 0.0;
    item.scores.total = item.scores.velocity
        + item.scores.trust * config.trust_weight
        + item.scores.alignment * config.alignment_weight;
}

/// Recompute corpus novelty over the selected batch and fold it into each
/// item's total.
///
/// `idf(k) = ln((N+1)/(df+1))` with df = number of batch items carrying the
/// keyword; an item's novelty is the mean idf of its keywords, capped. Items
/// without keywords score 0. A keyword absent from the df map falls back to
/// `ln(N+1)`.
pub fn apply_novelty(items: &mut [Item], config: &PipelineConfig) {
    let n = items.len() as f64;

    let mut df: HashMap<&str, f64> = HashMap::new();
    for item in items.iter() {
        for keyword in &item.keywords {
            *df.entry(keyword.as_str()).or_insert(0.0) += 1.0;
        }
    }

    let idfs: HashMap<String, f64> = df
        .iter()
        .map(|(k, d)| (k.to_string(), ((n + 1.0) / (d + 1.0)).ln()))
        .collect();
    let fallback = (n + 1.0).ln();

    for item in items.iter_mut() {
        let novelty = if item.keywords.is_empty() {
            0.0
        } else {
            let sum: f64 = item
                .keywords
                .iter()
                .map(|k| idfs.get(k).copied().unwrap_or(fallback))
                .sum();
            (sum / item.keywords.len() as f64).min(config.novelty_cap)
        };
        item.scores.novelty = novelty;
        item.scores.total += novelty * config.novelty_weight;
    }
}

/// Sort items by total score descending (stable for ties).
pub fn sort_by_score(items: &mut [Item]) {
    items.sort_by(|a, b| {
        b.scores
            .total
            .partial_cmp(&a.scores.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
