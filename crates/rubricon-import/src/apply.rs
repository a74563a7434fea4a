//! Applies a parsed item bank to the store.
//!
//! Matching is by natural key (item `code`, choice `choice_no`, criterion
//! `name`), so re-importing the same file updates in place instead of
//! duplicating. Row-level ids survive updates.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use rubricon_core::model::{
    ImportRowError, Item, ItemChoice, ItemType, Rubric, RubricCriterion,
};
use rubricon_store::{Store, StoreError, Upserted};

use crate::parser::{ParsedBank, ParsedItem};

/// What one import run did to the item bank.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub items_created: u32,
    pub items_updated: u32,
    pub rows_skipped: u32,
    pub errors: Vec<ImportRowError>,
}

/// Upsert every parsed item (and its rubric) into the store.
///
/// Parse-time row errors carry over into the outcome untouched.
pub async fn apply_item_bank(store: &Store, bank: ParsedBank) -> Result<ImportOutcome, StoreError> {
    let mut outcome = ImportOutcome {
        rows_skipped: bank.rows_skipped,
        errors: bank.errors,
        ..Default::default()
    };

    for parsed in bank.items {
        match apply_item(store, &parsed).await {
            Ok(Upserted::Created) => outcome.items_created += 1,
            Ok(Upserted::Updated) => outcome.items_updated += 1,
            Err(StoreError::UniqueViolation { entity, key }) => {
                // Bad group, not a bad batch. Record and keep going.
                outcome.errors.push(ImportRowError::new(
                    parsed.row,
                    format!("{entity} `{key}` conflicts with an existing record"),
                ));
                outcome.rows_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(outcome)
}

async fn apply_item(store: &Store, parsed: &ParsedItem) -> Result<Upserted, StoreError> {
    let now = Utc::now();
    let item = match store.item_by_code(&parsed.code).await {
        Some(mut existing) => {
            existing.item_type = parsed.item_type;
            existing.status = parsed.status;
            existing.difficulty = parsed.difficulty;
            existing.area = parsed.area.clone();
            existing.prompt = parsed.prompt.clone();
            existing.choices = merge_choices(&existing.choices, parsed);
            existing.updated_at = now;
            existing
        }
        None => {
            let mut item = Item::new(
                &parsed.code,
                parsed.item_type,
                parsed.difficulty,
                &parsed.prompt,
                &parsed.area,
            );
            item.status = parsed.status;
            item.choices = merge_choices(&[], parsed);
            item
        }
    };
    let item_id = item.id;
    let upserted = store.put_item(item).await?;

    // Rubric rows replace the item's rubric; a group without rubric rows
    // leaves any existing rubric alone.
    if parsed.item_type == ItemType::Constructed && !parsed.criteria.is_empty() {
        let rubric = match store.rubric_for_item(item_id).await {
            Some(mut existing) => {
                existing.criteria = merge_criteria(&existing.criteria, parsed);
                existing.updated_at = now;
                existing
            }
            None => Rubric::new(item_id, merge_criteria(&[], parsed)),
        };
        store.put_rubric(rubric).await?;
    }

    Ok(upserted)
}

/// Build the new choice list, keeping ids for choice numbers that already
/// exist. Choices absent from the file are dropped.
fn merge_choices(existing: &[ItemChoice], parsed: &ParsedItem) -> Vec<ItemChoice> {
    parsed
        .choices
        .iter()
        .map(|pc| {
            let mut choice = match existing.iter().find(|c| c.choice_no == pc.choice_no) {
                Some(prev) => prev.clone(),
                None => ItemChoice::new(pc.choice_no, &pc.content),
            };
            choice.content = pc.content.clone();
            choice.is_correct = pc.is_correct;
            choice.proximity_score = pc.proximity_score;
            choice
        })
        .collect()
}

/// Build the new criterion list, keeping ids for names that already exist.
fn merge_criteria(existing: &[RubricCriterion], parsed: &ParsedItem) -> Vec<RubricCriterion> {
    parsed
        .criteria
        .iter()
        .map(|pc| {
            let mut criterion = match existing.iter().find(|c| c.name == pc.name) {
                Some(prev) => prev.clone(),
                None => RubricCriterion::new(&pc.name, Vec::new()),
            };
            criterion.levels = pc.levels.clone();
            criterion
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_item_bank_str;

    const BANK_CSV: &str = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
RC-001,mcq,active,easy,inference,Which statement matches the passage?,1,The fox hid.,true,,,,
,,,,,,2,The fox slept.,false,60,,,
RC-002,constructed,draft,hard,argumentation,Explain the author's claim.,,,,,evidence use,0,No textual evidence.
,,,,,,,,,,evidence use,4,Fully grounded in text.
";

    #[tokio::test]
    async fn first_import_creates_everything() {
        let store = Store::new();
        let bank = parse_item_bank_str(BANK_CSV).unwrap();
        let outcome = apply_item_bank(&store, bank).await.unwrap();

        assert_eq!(outcome.items_created, 2);
        assert_eq!(outcome.items_updated, 0);
        assert!(outcome.errors.is_empty());

        let mcq = store.item_by_code("RC-001").await.unwrap();
        assert_eq!(mcq.choices.len(), 2);
        let constructed = store.item_by_code("RC-002").await.unwrap();
        let rubric = store.rubric_for_item(constructed.id).await.unwrap();
        assert_eq!(rubric.criteria.len(), 1);
        assert_eq!(rubric.criteria[0].levels.len(), 2);
    }

    #[tokio::test]
    async fn second_import_updates_without_duplicating() {
        let store = Store::new();
        let first = apply_item_bank(&store, parse_item_bank_str(BANK_CSV).unwrap())
            .await
            .unwrap();
        assert_eq!(first.items_created, 2);

        let item_id_before = store.item_by_code("RC-001").await.unwrap().id;
        let choice_id_before = store.item_by_code("RC-001").await.unwrap().choices[0].id;

        let second = apply_item_bank(&store, parse_item_bank_str(BANK_CSV).unwrap())
            .await
            .unwrap();
        assert_eq!(second.items_created, 0);
        assert_eq!(second.items_updated, 2);

        // Natural-key matching keeps ids stable.
        let after = store.item_by_code("RC-001").await.unwrap();
        assert_eq!(after.id, item_id_before);
        assert_eq!(after.choices[0].id, choice_id_before);
        assert_eq!(store.list_items().await.len(), 2);
    }

    #[tokio::test]
    async fn reimport_applies_field_changes() {
        let store = Store::new();
        apply_item_bank(&store, parse_item_bank_str(BANK_CSV).unwrap())
            .await
            .unwrap();

        let edited = BANK_CSV.replace("easy", "hard").replace(",60,", ",75,");
        apply_item_bank(&store, parse_item_bank_str(&edited).unwrap())
            .await
            .unwrap();

        let item = store.item_by_code("RC-001").await.unwrap();
        assert_eq!(item.difficulty, rubricon_core::model::Difficulty::Hard);
        assert_eq!(item.choices[1].proximity_score, Some(75));
    }

    #[tokio::test]
    async fn choices_absent_from_file_are_dropped() {
        let store = Store::new();
        apply_item_bank(&store, parse_item_bank_str(BANK_CSV).unwrap())
            .await
            .unwrap();

        let trimmed = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
RC-001,mcq,active,easy,inference,Which statement matches the passage?,1,The fox hid.,true,,,,
";
        apply_item_bank(&store, parse_item_bank_str(trimmed).unwrap())
            .await
            .unwrap();

        let item = store.item_by_code("RC-001").await.unwrap();
        assert_eq!(item.choices.len(), 1);
    }

    #[tokio::test]
    async fn criterion_ids_survive_rubric_reimport() {
        let store = Store::new();
        apply_item_bank(&store, parse_item_bank_str(BANK_CSV).unwrap())
            .await
            .unwrap();
        let item = store.item_by_code("RC-002").await.unwrap();
        let criterion_id = store.rubric_for_item(item.id).await.unwrap().criteria[0].id;

        let edited = BANK_CSV.replace("Fully grounded in text.", "Thoroughly grounded.");
        apply_item_bank(&store, parse_item_bank_str(&edited).unwrap())
            .await
            .unwrap();

        let rubric = store.rubric_for_item(item.id).await.unwrap();
        assert_eq!(rubric.criteria[0].id, criterion_id);
        assert_eq!(rubric.criteria[0].levels[1].descriptor, "Thoroughly grounded.");
    }

    #[tokio::test]
    async fn parse_errors_carry_into_outcome() {
        let store = Store::new();
        let csv = "\
item_code,item_type,status,difficulty,area,prompt,choice_no,choice_content,is_correct,proximity_score,criterion_name,level_score,level_descriptor
RC-001,riddle,active,easy,inference,Prompt?,1,A,true,,,,
RC-002,mcq,active,easy,inference,Prompt?,1,A,true,,,,
";
        let outcome = apply_item_bank(&store, parse_item_bank_str(csv).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome.items_created, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.rows_skipped, 1);
    }
}
