//! The `rubricon score` command.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use comfy_table::{Cell, Table};
use rubricon_core::model::JobKind;
use rubricon_core::summary::AttemptSummary;
use rubricon_jobs::JobContext;
use rubricon_providers::load_config_from;
use rubricon_providers::mock::MockProvider;
use uuid::Uuid;

pub async fn execute(attempt: Uuid, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = Arc::new(super::open_store(&config)?);

    // Scoring never calls the provider, so a mock stands in for it.
    let ctx = JobContext {
        store: Arc::clone(&store),
        provider: Arc::new(MockProvider::new(HashMap::new())),
        config: super::jobs_config(&config),
    };
    let kind = JobKind::ScoreAttempt {
        attempt_id: attempt,
    };
    rubricon_jobs::handlers::execute(&ctx, &kind).await?;

    let summary = store.attempt_summary(attempt).await?;
    print_summary(&summary);

    super::save_store(&store, &config).await?;
    Ok(())
}

fn print_summary(summary: &AttemptSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Area", "Items", "Raw", "Max", "Pct"]);
    for area in &summary.areas {
        table.add_row(vec![
            Cell::new(&area.area),
            Cell::new(area.items),
            Cell::new(area.raw),
            Cell::new(area.max),
            Cell::new(format!("{:.1}%", area.pct)),
        ]);
    }
    println!("{table}");
    println!(
        "Total: {}/{} raw, {} scored, {} awaiting a grade",
        summary.total_raw, summary.total_max, summary.scored_responses, summary.unscored_responses
    );
}
