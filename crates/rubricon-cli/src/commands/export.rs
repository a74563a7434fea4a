//! The `rubricon export-template` and `rubricon export-items` commands.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rubricon_core::model::Rubric;
use rubricon_import::{export_items, template_csv};
use rubricon_providers::load_config_from;
use uuid::Uuid;

pub fn execute_template(output: PathBuf) -> Result<()> {
    std::fs::write(&output, template_csv())
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Template written to {}", output.display());
    Ok(())
}

pub async fn execute_items(output: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = super::open_store(&config)?;

    let items = store.list_items().await;
    let rubrics: HashMap<Uuid, Rubric> = store
        .list_rubrics()
        .await
        .into_iter()
        .map(|r| (r.item_id, r))
        .collect();

    let csv = export_items(&items, &rubrics)?;
    std::fs::write(&output, csv)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Exported {} item(s) to {}", items.len(), output.display());
    Ok(())
}
