//! `worldview scan` — Run the redundancy detector over all axes.

use super::CliResult;
use std::sync::Arc;
use worldview_belief::RedundancyScanner;
use worldview_config::AppConfig;
use worldview_services::HttpEmbedder;

pub async fn run(config: &AppConfig) -> CliResult {
    let store = super::open_store(config).await?;
    let embedder = Arc::new(HttpEmbedder::from_config(&config.services)?);
    let scanner = RedundancyScanner::new(store, embedder, config.belief.clone());

    let proposals = scanner.scan().await?;
    if proposals.is_empty() {
        println!("No redundant axis pairs found");
        return Ok(());
    }

    println!("Merge proposals ({}):", proposals.len());
    for p in &proposals {
        println!(
            "  {} <> {}  similarity {:.3}  (evidence {} vs {})",
            p.axis_a, p.axis_b, p.similarity, p.evidence_a, p.evidence_b
        );
    }
    println!("\nMerge with: worldview apply --merge <AXIS_A> <AXIS_B>");
    Ok(())
}
