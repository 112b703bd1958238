//! `worldview beliefs` — List belief axes and drift alerts.

use super::CliResult;
use worldview_config::AppConfig;
use worldview_core::store::AxisStore;

pub async fn run(config: &AppConfig, alerts: bool) -> CliResult {
    let store = super::open_store(config).await?;
    let axes = store.list_axes().await?;

    if axes.is_empty() {
        println!("No belief axes yet — run `worldview apply` with a new_axis delta");
        return Ok(());
    }

    println!("Belief axes ({}):", axes.len());
    for axis in &axes {
        let absorbed = store.resolve_redirect(&axis.id).await?;
        let marker = match &absorbed {
            Some(target) => format!("  -> merged into {target}"),
            None => String::new(),
        };
        println!(
            "  {:<24} {:<32} score {:+.3}  confidence {:.3}  evidence {}{}",
            axis.id,
            axis.label,
            axis.score,
            axis.confidence,
            axis.evidence.len(),
            marker
        );
    }

    if alerts {
        let drift = store.list_drift_alerts().await?;
        println!("\nDrift alerts ({}):", drift.len());
        for alert in &drift {
            println!(
                "  {}  {}  value {:.2} at evidence #{} ({})",
                alert.axis_id,
                alert.direction,
                alert.value,
                alert.evidence_index,
                alert.detected_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
    }

    Ok(())
}
