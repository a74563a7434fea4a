//! The `rubricon validate` command.

use std::path::PathBuf;

use anyhow::Result;
use rubricon_import::parse_item_bank;

/// Parses an item-bank CSV and reports problems without touching the
/// store.
pub fn execute(file: PathBuf) -> Result<()> {
    let bank = parse_item_bank(&file)?;

    println!("Parsed {} item(s) from {}", bank.items.len(), file.display());
    for item in &bank.items {
        let detail = match item.choices.len() {
            0 => format!("{} criteria", item.criteria.len()),
            n => format!("{n} choices"),
        };
        println!("  {} [{}] {} ({detail})", item.code, item.item_type, item.area);
    }

    if bank.errors.is_empty() {
        println!("\nItem bank is valid.");
    } else {
        println!();
        for error in &bank.errors {
            println!("  row {}: {}", error.row, error.message);
        }
        println!("{} problem row(s) found.", bank.errors.len());
    }
    Ok(())
}
