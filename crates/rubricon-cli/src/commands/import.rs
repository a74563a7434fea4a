//! The `rubricon import` command.

use std::path::PathBuf;

use anyhow::Result;
use rubricon_import::{apply_item_bank, parse_item_bank};
use rubricon_providers::load_config_from;

pub async fn execute(file: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = super::open_store(&config)?;

    let bank = parse_item_bank(&file)?;
    println!("Parsed {} item(s) from {}", bank.items.len(), file.display());

    let outcome = apply_item_bank(&store, bank).await?;
    for error in &outcome.errors {
        println!("  row {}: {}", error.row, error.message);
    }
    println!(
        "Import complete: {} created, {} updated, {} row(s) skipped",
        outcome.items_created, outcome.items_updated, outcome.rows_skipped
    );

    super::save_store(&store, &config).await?;
    Ok(())
}
