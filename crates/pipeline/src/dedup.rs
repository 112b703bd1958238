//! Near-duplicate removal by keyword-set Jaccard similarity.

use std::collections::HashSet;
use worldview_core::item::Item;

/// Jaccard similarity `|A∩B| / |A∪B|` over two keyword sets.
/// Empty sets are never similar to anything.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Remove near-duplicates from a score-descending batch.
///
/// Walking best-first, an item is kept unless some already-kept item has
/// keyword Jaccard similarity at or above `threshold`, so the highest
/// scorer of every duplicate group is guaranteed to survive.
pub fn dedup(items: Vec<Item>, threshold: f64) -> Vec<Item> {
    let mut kept: Vec<Item> = Vec::with_capacity(items.len());
    for item in items {
        let duplicate = kept
            .iter()
            .any(|k| jaccard(&k.keywords, &item.keywords) >= threshold);
        if !duplicate {
            kept.push(item);
        }
    }
    kept
}
