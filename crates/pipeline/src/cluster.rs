//! Greedy single-linkage clustering and burst detection.

use crate::dedup::jaccard;
use std::collections::{HashMap, HashSet};
use worldview_core::cluster::Cluster;
use worldview_core::item::Item;

/// Cluster a score-descending batch.
///
/// Each item joins the first existing cluster whose *representative* has
/// Jaccard similarity >= `threshold` to it; otherwise it opens a new cluster
/// as representative. Because the input is score-descending, every
/// representative is the best-scoring member of its cluster. O(n·k) for k
/// resulting clusters.
pub fn cluster_items(items: Vec<Item>, threshold: f64) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for item in items {
        let joined = clusters.iter_mut().find(|c| {
            jaccard(&c.representative.keywords, &item.keywords) >= threshold
        });
        match joined {
            Some(cluster) => cluster.members.push(item),
            None => {
                let label = item.keywords.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
                clusters.push(Cluster {
                    representative: item,
                    members: Vec::new(),
                    label,
                    bursting: false,
                });
            }
        }
    }

    clusters.sort_by(|a, b| {
        b.top_score()
            .partial_cmp(&a.top_score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    clusters
}

/// Keywords whose current-window frequency at least doubled versus the
/// previous window: `current >= 2 && current > 2 * previous` (a keyword
/// absent from the previous window has previous = 0).
pub fn burst_keywords(
    current: &HashMap<String, u64>,
    previous: &HashMap<String, u64>,
) -> HashSet<String> {
    current
        .iter()
        .filter(|&(keyword, &count)| {
            let prior = previous.get(keyword).copied().unwrap_or(0);
            count >= 2 && count > 2 * prior
        })
        .map(|(keyword, _)| keyword.clone())
        .collect()
}

/// Flag clusters whose representative keywords intersect the burst set.
pub fn tag_bursts(clusters: &mut [Cluster], bursts: &HashSet<String>) {
    for cluster in clusters.iter_mut() {
        cluster.bursting = cluster
            .representative
            .keywords
            .iter()
            .any(|k| bursts.contains(k));
    }
}

/// Distinct-per-item keyword frequencies for the current batch.
pub fn batch_keyword_frequencies(items: &[Item]) -> HashMap<String, u64> {
    let mut freqs = HashMap::new();
    for item in items {
        let distinct: HashSet<&String> = item.keywords.iter().collect();
        for keyword in distinct {
            *freqs.entry(keyword.clone()).or_insert(0) += 1;
        }
    }
    freqs
}
