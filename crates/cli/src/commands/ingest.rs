//! `worldview ingest` — Run one ingestion cycle over a JSON item batch.

use super::CliResult;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use worldview_config::AppConfig;
use worldview_core::item::RawItem;
use worldview_core::store::AxisStore;
use worldview_pipeline::IngestPipeline;
use worldview_services::StaticReputation;

pub async fn run(config: &AppConfig, file: Option<PathBuf>) -> CliResult {
    let input = super::read_input(file.as_deref())?;
    let batch: Vec<RawItem> = serde_json::from_str(&input)
        .map_err(|e| format!("Failed to parse item batch: {e}"))?;

    let store = super::open_store(config).await?;
    let reputation = Arc::new(StaticReputation::from_config(&config.services));

    // Alignment scoring works off the current axis set; a failing axis
    // side must not stop ingestion.
    let axes = match store.list_axes().await {
        Ok(axes) => axes,
        Err(e) => {
            warn!(error = %e, "Could not load axes, scoring without alignment");
            Vec::new()
        }
    };

    let mut pipeline = IngestPipeline::new(store, reputation, config.pipeline.clone());
    let digest = pipeline.run(batch, &axes).await?;

    println!("Ingested {} item(s), {} persisted", digest.item_count(), digest.persisted);
    if !digest.burst_keywords.is_empty() {
        println!("Bursting: {}", digest.burst_keywords.join(", "));
    }
    for cluster in &digest.clusters {
        let burst = if cluster.bursting { "  [BURST]" } else { "" };
        println!(
            "\n[{}] ({} items, top score {:.2}){burst}",
            cluster.label,
            cluster.len(),
            cluster.top_score()
        );
        println!("  - {}", cluster.representative.text);
        for member in &cluster.members {
            println!("  - {}", member.text);
        }
    }
    if !digest.singletons.is_empty() {
        println!();
        for item in &digest.singletons {
            println!("  * [{:.2}] {}", item.scores.total, item.text);
        }
    }

    Ok(())
}
