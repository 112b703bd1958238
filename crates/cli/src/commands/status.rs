//! `worldview status` — Show store and configuration status.

use super::CliResult;
use worldview_config::AppConfig;
use worldview_core::store::{AxisStore, ItemStore};

pub async fn run(config: &AppConfig) -> CliResult {
    println!("Worldview Status");
    println!("================");
    println!("  Config dir:  {}", AppConfig::config_dir().display());
    println!("  Database:    {}", config.store.db_path);
    println!("  Embedder:    {} ({})", config.services.embedding_url, config.services.embedding_model);
    println!("  Validator:   {} ({})", config.services.validator_url, config.services.validator_model);

    let store = super::open_store(config).await?;
    let items = store.item_count().await?;
    let axes = store.list_axes().await?;
    let alerts = store.list_drift_alerts().await?;
    let evidence: usize = axes.iter().map(|a| a.evidence.len()).sum();

    println!("\n  Items:         {items}");
    println!("  Belief axes:   {}", axes.len());
    println!("  Evidence:      {evidence}");
    println!("  Drift alerts:  {}", alerts.len());

    Ok(())
}
