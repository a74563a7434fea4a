//! Item-bank CSV export.
//!
//! Produces the same fixed layout the parser reads, so an exported file
//! (or the blank template) can be edited and re-imported directly.

use std::collections::HashMap;

use anyhow::{Context, Result};
use uuid::Uuid;

use rubricon_core::model::{Item, ItemType, Rubric};

use crate::parser::EXPECTED_HEADER;

/// Blank import template: the header plus commented example rows the
/// parser skips.
pub fn template_csv() -> String {
    let mut out = String::new();
    out.push_str(&EXPECTED_HEADER.join(","));
    out.push('\n');
    out.push_str("# one row per mcq choice or per rubric level\n");
    out.push_str("# item fields go on the first row of each item group; leave them blank on the rows after it\n");
    out.push_str(
        "# example mcq:         RC-001,mcq,draft,easy,inference,Which statement matches the passage?,1,The fox hid.,true,,,,\n",
    );
    out.push_str("# example near miss:   ,,,,,,2,The fox slept.,false,60,,,\n");
    out.push_str(
        "# example constructed: WR-014,constructed,draft,hard,argumentation,Explain the claim.,,,,,evidence use,4,Fully grounded in text.\n",
    );
    out
}

/// Export the current item bank, one group per item, sorted by code.
///
/// `rubrics` is keyed by item id; constructed items without an entry
/// export with no rubric rows.
pub fn export_items(items: &[Item], rubrics: &HashMap<Uuid, Rubric>) -> Result<String> {
    let mut sorted: Vec<&Item> = items.iter().collect();
    sorted.sort_by(|a, b| a.code.cmp(&b.code));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(EXPECTED_HEADER)
        .context("failed to write CSV header")?;

    for item in sorted {
        let details = detail_rows(item, rubrics.get(&item.id));
        if details.is_empty() {
            writer
                .write_record(full_record(item, &blank_details()))
                .context("failed to write item row")?;
            continue;
        }
        for (i, detail) in details.iter().enumerate() {
            let record = if i == 0 {
                full_record(item, detail)
            } else {
                continuation_record(detail)
            };
            writer.write_record(record).context("failed to write row")?;
        }
    }

    let bytes = writer
        .into_inner()
        .context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("exported CSV was not valid UTF-8")
}

/// The 7 detail cells: choice_no, choice_content, is_correct,
/// proximity_score, criterion_name, level_score, level_descriptor.
type DetailCells = [String; 7];

fn blank_details() -> DetailCells {
    Default::default()
}

fn detail_rows(item: &Item, rubric: Option<&Rubric>) -> Vec<DetailCells> {
    match item.item_type {
        ItemType::Mcq => {
            let mut choices: Vec<_> = item.choices.iter().collect();
            choices.sort_by_key(|c| c.choice_no);
            choices
                .into_iter()
                .map(|c| {
                    [
                        c.choice_no.to_string(),
                        c.content.clone(),
                        c.is_correct.to_string(),
                        c.proximity_score.map(|p| p.to_string()).unwrap_or_default(),
                        String::new(),
                        String::new(),
                        String::new(),
                    ]
                })
                .collect()
        }
        ItemType::Constructed => rubric
            .map(|r| {
                r.criteria
                    .iter()
                    .flat_map(|criterion| {
                        criterion.levels.iter().map(|level| {
                            [
                                String::new(),
                                String::new(),
                                String::new(),
                                String::new(),
                                criterion.name.clone(),
                                level.score.to_string(),
                                level.descriptor.clone(),
                            ]
                        })
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn full_record(item: &Item, detail: &DetailCells) -> Vec<String> {
    let mut record = vec![
        item.code.clone(),
        item.item_type.to_string(),
        item.status.to_string(),
        item.difficulty.to_string(),
        item.area.clone(),
        item.prompt.clone(),
    ];
    record.extend(detail.iter().cloned());
    record
}

fn continuation_record(detail: &DetailCells) -> Vec<String> {
    let mut record = vec![String::new(); 6];
    record.extend(detail.iter().cloned());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubricon_core::model::{
        Difficulty, ItemChoice, ItemStatus, RubricCriterion, RubricLevel,
    };

    use crate::parser::parse_item_bank_str;

    fn sample_mcq() -> Item {
        let mut item = Item::new(
            "RC-001",
            ItemType::Mcq,
            Difficulty::Easy,
            "Which statement matches the passage?",
            "inference",
        );
        item.status = ItemStatus::Active;
        let mut correct = ItemChoice::new(1, "The fox hid.");
        correct.is_correct = true;
        let mut near = ItemChoice::new(2, "The fox slept.");
        near.proximity_score = Some(60);
        item.choices = vec![correct, near];
        item
    }

    fn sample_constructed() -> (Item, Rubric) {
        let item = Item::new(
            "WR-014",
            ItemType::Constructed,
            Difficulty::Hard,
            "Explain the author's claim.",
            "argumentation",
        );
        let rubric = Rubric::new(
            item.id,
            vec![RubricCriterion::new(
                "evidence use",
                vec![
                    RubricLevel {
                        score: 0,
                        descriptor: "No textual evidence.".into(),
                    },
                    RubricLevel {
                        score: 4,
                        descriptor: "Fully grounded in text.".into(),
                    },
                ],
            )],
        );
        (item, rubric)
    }

    #[test]
    fn template_parses_clean() {
        let bank = parse_item_bank_str(&template_csv()).unwrap();
        assert!(bank.items.is_empty());
        assert!(bank.errors.is_empty(), "{:?}", bank.errors);
    }

    #[test]
    fn export_layout_puts_item_fields_on_first_row_only() {
        let csv = export_items(&[sample_mcq()], &HashMap::new()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("RC-001,mcq,active,easy,"));
        assert!(lines[2].starts_with(",,,,,,2,"));
        assert!(lines[2].contains(",60,"));
    }

    #[test]
    fn export_then_import_round_trip() {
        let (constructed, rubric) = sample_constructed();
        let mut rubrics = HashMap::new();
        rubrics.insert(constructed.id, rubric);

        let csv = export_items(&[sample_mcq(), constructed], &rubrics).unwrap();
        let bank = parse_item_bank_str(&csv).unwrap();

        assert!(bank.errors.is_empty(), "{:?}", bank.errors);
        assert_eq!(bank.items.len(), 2);
        // Sorted by code: RC-001 before WR-014.
        assert_eq!(bank.items[0].code, "RC-001");
        assert_eq!(bank.items[0].choices.len(), 2);
        assert_eq!(bank.items[0].choices[1].proximity_score, Some(60));
        assert_eq!(bank.items[1].code, "WR-014");
        assert_eq!(bank.items[1].criteria.len(), 1);
        assert_eq!(bank.items[1].criteria[0].levels.len(), 2);
    }

    #[test]
    fn item_without_details_exports_one_row() {
        let item = Item::new(
            "RC-900",
            ItemType::Mcq,
            Difficulty::Medium,
            "Placeholder prompt.",
            "inference",
        );
        let csv = export_items(&[item], &HashMap::new()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(",,,,,,"));
    }

    #[test]
    fn fields_with_commas_survive_round_trip() {
        let mut item = sample_mcq();
        item.prompt = "First, second, or third?".into();
        let csv = export_items(&[item], &HashMap::new()).unwrap();
        let bank = parse_item_bank_str(&csv).unwrap();
        assert!(bank.errors.is_empty());
        assert_eq!(bank.items[0].prompt, "First, second, or third?");
    }
}
