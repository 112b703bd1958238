//! `worldview apply` — Apply external axis deltas or a merge decision.

use super::CliResult;
use std::path::PathBuf;
use std::sync::Arc;
use worldview_belief::BeliefEngine;
use worldview_config::AppConfig;
use worldview_core::axis::AxisDelta;
use worldview_services::LlmStanceValidator;

pub async fn run(
    config: &AppConfig,
    file: Option<PathBuf>,
    merge: Option<Vec<String>>,
) -> CliResult {
    let store = super::open_store(config).await?;
    let validator = Arc::new(LlmStanceValidator::from_config(&config.services)?);
    let engine = BeliefEngine::new(store, validator, config.belief.clone());

    if let Some(pair) = merge {
        let survivor = engine.apply_merge(&pair[0], &pair[1]).await?;
        println!("Merged: {} survives", survivor);
        return Ok(());
    }

    let input = super::read_input(file.as_deref())?;
    let deltas: Vec<AxisDelta> = serde_json::from_str(&input)
        .map_err(|e| format!("Failed to parse delta array: {e}"))?;

    let report = engine.apply_deltas(deltas).await?;
    println!("Applied {} delta(s), skipped {}", report.applied, report.skipped);
    Ok(())
}
