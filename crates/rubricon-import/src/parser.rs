//! Item-bank CSV parser.
//!
//! Parses the fixed-layout spreadsheet into items, choices and rubric
//! criteria, collecting row-level errors instead of aborting.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use rubricon_core::model::{
    Difficulty, ImportRowError, ItemStatus, ItemType, RubricLevel, MAX_LEVEL_SCORE,
};

/// Column layout every import file must carry, in order.
pub const EXPECTED_HEADER: [&str; 13] = [
    "item_code",
    "item_type",
    "status",
    "difficulty",
    "area",
    "prompt",
    "choice_no",
    "choice_content",
    "is_correct",
    "proximity_score",
    "criterion_name",
    "level_score",
    "level_descriptor",
];

/// Intermediate CSV row. Every cell is read as text; blank item cells mark
/// a continuation of the previous item group.
#[derive(Debug, Deserialize)]
struct CsvRow {
    item_code: String,
    item_type: String,
    status: String,
    difficulty: String,
    area: String,
    prompt: String,
    choice_no: String,
    choice_content: String,
    is_correct: String,
    proximity_score: String,
    criterion_name: String,
    level_score: String,
    level_descriptor: String,
}

/// An item assembled from one spreadsheet group.
#[derive(Debug, Clone)]
pub struct ParsedItem {
    pub code: String,
    pub item_type: ItemType,
    pub status: ItemStatus,
    pub difficulty: Difficulty,
    pub area: String,
    pub prompt: String,
    pub choices: Vec<ParsedChoice>,
    pub criteria: Vec<ParsedCriterion>,
    /// Line the group started on, 1-based counting the header.
    pub row: u32,
}

#[derive(Debug, Clone)]
pub struct ParsedChoice {
    pub choice_no: u8,
    pub content: String,
    pub is_correct: bool,
    pub proximity_score: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ParsedCriterion {
    pub name: String,
    pub levels: Vec<RubricLevel>,
}

/// Everything recovered from one import file.
#[derive(Debug, Default)]
pub struct ParsedBank {
    pub items: Vec<ParsedItem>,
    pub errors: Vec<ImportRowError>,
    /// Data rows that could not be attached to a valid item.
    pub rows_skipped: u32,
}

/// Parse an item-bank CSV file.
pub fn parse_item_bank(path: &Path) -> Result<ParsedBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read import file: {}", path.display()))?;
    parse_item_bank_str(&content)
}

/// Parse item-bank CSV content (useful for testing and HTTP bodies).
///
/// Row-level problems land in `errors` and poison only their own item
/// group; the rest of the file still imports. Only a missing or reordered
/// header aborts the parse.
pub fn parse_item_bank_str(content: &str) -> Result<ParsedBank> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_reader(content.as_bytes());

    let headers = reader.headers().context("failed to read CSV header")?.clone();
    if headers.iter().collect::<Vec<_>>() != EXPECTED_HEADER {
        anyhow::bail!(
            "unexpected CSV header: expected `{}`",
            EXPECTED_HEADER.join(",")
        );
    }

    let mut bank = ParsedBank::default();
    // Current group, or None after a poisoned item row.
    let mut current: Option<ParsedItem> = None;
    let mut in_poisoned_group = false;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line() as u32).unwrap_or(0);
                bank.errors
                    .push(ImportRowError::new(line, format!("malformed row: {e}")));
                bank.rows_skipped += 1;
                continue;
            }
        };
        let line = record.position().map(|p| p.line() as u32).unwrap_or(0);
        let row: CsvRow = match record.deserialize(Some(&headers)) {
            Ok(r) => r,
            Err(e) => {
                bank.errors
                    .push(ImportRowError::new(line, format!("malformed row: {e}")));
                bank.rows_skipped += 1;
                continue;
            }
        };

        if !row.item_code.trim().is_empty() {
            // New item group starts.
            if let Some(done) = current.take() {
                bank.items.push(done);
            }
            in_poisoned_group = false;
            match parse_item_row(&row, line) {
                Ok(item) => current = Some(item),
                Err(message) => {
                    bank.errors.push(ImportRowError::new(line, message));
                    bank.rows_skipped += 1;
                    in_poisoned_group = true;
                    continue;
                }
            }
        } else if current.is_none() && !in_poisoned_group {
            bank.errors.push(ImportRowError::new(
                line,
                "continuation row before any item row",
            ));
            bank.rows_skipped += 1;
            continue;
        }

        if in_poisoned_group {
            // Rows belonging to an item that failed to parse.
            bank.rows_skipped += 1;
            continue;
        }

        if let Some(item) = current.as_mut() {
            if let Err(message) = parse_detail_cells(&row, item) {
                bank.errors.push(ImportRowError::new(line, message));
                bank.rows_skipped += 1;
            }
        }
    }

    if let Some(done) = current.take() {
        bank.items.push(done);
    }

    Ok(bank)
}

fn parse_item_row(row: &CsvRow, line: u32) -> std::result::Result<ParsedItem, String> {
    let item_type: ItemType = row.item_type.trim().parse()?;
    let status: ItemStatus = row.status.trim().parse()?;
    let difficulty: Difficulty = row.difficulty.trim().parse()?;
    if row.prompt.trim().is_empty() {
        return Err("missing prompt".into());
    }
    if row.area.trim().is_empty() {
        return Err("missing area".into());
    }

    Ok(ParsedItem {
        code: row.item_code.trim().to_string(),
        item_type,
        status,
        difficulty,
        area: row.area.trim().to_string(),
        prompt: row.prompt.trim().to_string(),
        choices: Vec::new(),
        criteria: Vec::new(),
        row: line,
    })
}

/// Read the choice / rubric columns of one row into the current item.
fn parse_detail_cells(row: &CsvRow, item: &mut ParsedItem) -> std::result::Result<(), String> {
    let has_choice = !row.choice_no.trim().is_empty() || !row.choice_content.trim().is_empty();
    let has_criterion = !row.criterion_name.trim().is_empty();

    if has_choice && has_criterion {
        return Err("row mixes choice and rubric columns".into());
    }

    if has_choice {
        if item.item_type != ItemType::Mcq {
            return Err("choice row on a constructed item".into());
        }
        let choice_no: u8 = row
            .choice_no
            .trim()
            .parse()
            .map_err(|_| format!("invalid choice number `{}`", row.choice_no.trim()))?;
        if item.choices.iter().any(|c| c.choice_no == choice_no) {
            return Err(format!("duplicate choice number {choice_no}"));
        }
        let is_correct = parse_bool(&row.is_correct)?;
        let proximity_score = parse_proximity(&row.proximity_score)?;
        item.choices.push(ParsedChoice {
            choice_no,
            content: row.choice_content.trim().to_string(),
            is_correct,
            proximity_score,
        });
        return Ok(());
    }

    if has_criterion {
        if item.item_type != ItemType::Constructed {
            return Err("rubric row on an mcq item".into());
        }
        let score: u8 = row
            .level_score
            .trim()
            .parse()
            .map_err(|_| format!("invalid level score `{}`", row.level_score.trim()))?;
        if score > MAX_LEVEL_SCORE {
            return Err(format!(
                "level score {score} above maximum {MAX_LEVEL_SCORE}"
            ));
        }
        let name = row.criterion_name.trim().to_string();
        let level = RubricLevel {
            score,
            descriptor: row.level_descriptor.trim().to_string(),
        };
        match item.criteria.iter_mut().find(|c| c.name == name) {
            Some(criterion) => criterion.levels.push(level),
            None => item.criteria.push(ParsedCriterion {
                name,
                levels: vec![level],
            }),
        }
        return Ok(());
    }

    // An item row with no detail cells is fine; a continuation row with
    // nothing in it is not.
    if row.item_code.trim().is_empty() {
        return Err("row has neither choice nor rubric columns".into());
    }
    Ok(())
}

fn parse_bool(s: &str) -> std::result::Result<bool, String> {
    match s.trim().to_lowercase().as_str() {
        "" | "false" | "0" | "no" => Ok(false),
        "true" | "1" | "yes" => Ok(true),
        other => Err(format!("invalid is_correct value `{other}`")),
    }
}

fn parse_proximity(s: &str) -> std::result::Result<Option<u32>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let score: u32 = s
        .parse()
        .map_err(|_| format!("invalid proximity score `{s}`"))?;
    if score > 100 {
        return Err(format!("proximity score {score} above maximum 100"));
    }
    Ok(Some(score))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CSV: &str = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
RC-001,mcq,active,easy,inference,Which statement matches the passage?,1,The fox hid.,true,,,,
,,,,,,2,The fox slept.,false,60,,,
,,,,,,3,The fox left.,false,,,,
RC-002,constructed,draft,hard,argumentation,Explain the author's claim.,,,,,evidence use,0,No textual evidence.
,,,,,,,,,,evidence use,2,Partially grounded in text.
,,,,,,,,,,evidence use,4,Fully grounded in text.
,,,,,,,,,,clarity,0,Unclear throughout.
,,,,,,,,,,clarity,4,Clear throughout.
";

    #[test]
    fn parse_valid_bank() {
        let bank = parse_item_bank_str(VALID_CSV).unwrap();
        assert!(bank.errors.is_empty(), "{:?}", bank.errors);
        assert_eq!(bank.items.len(), 2);

        let mcq = &bank.items[0];
        assert_eq!(mcq.code, "RC-001");
        assert_eq!(mcq.item_type, ItemType::Mcq);
        assert_eq!(mcq.status, ItemStatus::Active);
        assert_eq!(mcq.choices.len(), 3);
        assert!(mcq.choices[0].is_correct);
        assert_eq!(mcq.choices[1].proximity_score, Some(60));

        let constructed = &bank.items[1];
        assert_eq!(constructed.item_type, ItemType::Constructed);
        assert_eq!(constructed.criteria.len(), 2);
        assert_eq!(constructed.criteria[0].name, "evidence use");
        assert_eq!(constructed.criteria[0].levels.len(), 3);
        assert_eq!(constructed.criteria[1].levels.len(), 2);
    }

    #[test]
    fn bad_rows_do_not_abort() {
        let csv = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
RC-001,mcq,active,impossible,inference,Prompt?,1,A,true,,,,
RC-002,mcq,active,easy,inference,Prompt?,1,A,true,,,,
,,,,,,1,B,false,,,,
,,,,,,2,C,false,150,,,
";
        let bank = parse_item_bank_str(csv).unwrap();
        // RC-001 has an unknown difficulty; its row is skipped.
        assert_eq!(bank.items.len(), 1);
        assert_eq!(bank.items[0].code, "RC-002");
        // Duplicate choice 1 and the out-of-range proximity are errors,
        // but choice 1 itself survived.
        assert_eq!(bank.items[0].choices.len(), 1);
        assert_eq!(bank.errors.len(), 3);
        assert_eq!(bank.rows_skipped, 3);
        assert!(bank.errors[0].message.contains("impossible"));
        assert_eq!(bank.errors[0].row, 2);
        assert!(bank.errors[1].message.contains("duplicate choice number"));
        assert!(bank.errors[2].message.contains("proximity score 150"));
    }

    #[test]
    fn rows_after_poisoned_item_are_skipped_quietly() {
        let csv = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
RC-001,riddle,active,easy,inference,Prompt?,1,A,true,,,,
,,,,,,2,B,false,,,,
,,,,,,3,C,false,,,,
";
        let bank = parse_item_bank_str(csv).unwrap();
        assert!(bank.items.is_empty());
        // One error for the bad item row; the two continuations are
        // counted but not reported individually.
        assert_eq!(bank.errors.len(), 1);
        assert_eq!(bank.rows_skipped, 3);
    }

    #[test]
    fn continuation_before_any_item() {
        let csv = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
,,,,,,1,A,true,,,,
";
        let bank = parse_item_bank_str(csv).unwrap();
        assert!(bank.items.is_empty());
        assert_eq!(bank.errors.len(), 1);
        assert!(bank.errors[0].message.contains("before any item"));
    }

    #[test]
    fn rubric_rows_on_mcq_item_rejected() {
        let csv = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
RC-001,mcq,active,easy,inference,Prompt?,,,,,evidence use,2,Some evidence.
";
        let bank = parse_item_bank_str(csv).unwrap();
        assert_eq!(bank.items.len(), 1);
        assert!(bank.items[0].criteria.is_empty());
        assert!(bank.errors[0].message.contains("rubric row on an mcq item"));
    }

    #[test]
    fn level_score_above_maximum_rejected() {
        let csv = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
RC-001,constructed,draft,medium,clarity,Prompt?,,,,,clarity,5,Too high.
";
        let bank = parse_item_bank_str(csv).unwrap();
        assert_eq!(bank.errors.len(), 1);
        assert!(bank.errors[0].message.contains("above maximum 4"));
        assert!(bank.items[0].criteria.is_empty());
    }

    #[test]
    fn wrong_header_aborts() {
        let csv = "code,kind\nRC-001,mcq\n";
        let err = parse_item_bank_str(csv).unwrap_err();
        assert!(err.to_string().contains("unexpected CSV header"));
    }

    #[test]
    fn comment_lines_are_skipped() {
        let csv = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
# example: RC-001,mcq,active,easy,inference,...
RC-001,mcq,active,easy,inference,Prompt?,1,A,true,,,,
";
        let bank = parse_item_bank_str(csv).unwrap();
        assert!(bank.errors.is_empty());
        assert_eq!(bank.items.len(), 1);
    }
}
