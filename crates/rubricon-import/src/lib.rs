//! rubricon-import — item-bank spreadsheet import and export.
//!
//! Parses the fixed-layout CSV into items, choices and rubrics, applies
//! them to the store by natural key, and writes the matching template and
//! pre-filled exports.

pub mod apply;
pub mod export;
pub mod parser;

pub use apply::{apply_item_bank, ImportOutcome};
pub use export::{export_items, template_csv};
pub use parser::{parse_item_bank, parse_item_bank_str, ParsedBank, ParsedItem};
