//! The response scoring evaluator.
//!
//! Scoring is a pure function from a response and its item (plus, for
//! constructed items, the rubric and recorded levels) to a `ScoreState`.
//! Callers decide where inputs come from and where the result lands;
//! nothing here touches storage.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{RubricScoreError, ScoringError};
use crate::model::{
    Item, ItemType, Response, ResponseRubricScore, Rubric, ScoreState, MCQ_MAX_SCORE,
};

/// Scores one response against its item.
///
/// `rubric` and `rubric_scores` are only consulted for constructed items;
/// mcq scoring ignores them.
pub fn score_response(
    item: &Item,
    response: &Response,
    rubric: Option<&Rubric>,
    rubric_scores: &[ResponseRubricScore],
) -> Result<ScoreState, ScoringError> {
    match item.item_type {
        ItemType::Mcq => score_mcq(item, response),
        ItemType::Constructed => {
            let rubric = rubric.ok_or(ScoringError::MissingRubric { item_id: item.id })?;
            Ok(score_constructed(rubric, rubric_scores))
        }
    }
}

/// Scores a multiple-choice response out of [`MCQ_MAX_SCORE`].
///
/// A selected choice earns its proximity score when one is set, otherwise
/// full credit if correct and zero if not. No selection scores zero and
/// is flagged unanswered rather than treated as wrong.
pub fn score_mcq(item: &Item, response: &Response) -> Result<ScoreState, ScoringError> {
    if item.item_type != ItemType::Mcq {
        return Err(ScoringError::NotMultipleChoice { item_id: item.id });
    }
    let Some(choice_id) = response.selected_choice_id else {
        return Ok(ScoreState::Scored {
            raw_score: 0,
            max_score: MCQ_MAX_SCORE,
            unanswered: true,
        });
    };
    let choice = item
        .choice_by_id(choice_id)
        .ok_or(ScoringError::UnknownChoice {
            response_id: response.id,
            choice_id,
        })?;
    let raw_score = match choice.proximity_score {
        Some(proximity) => proximity,
        None if choice.is_correct => MCQ_MAX_SCORE,
        None => 0,
    };
    Ok(ScoreState::scored(raw_score, MCQ_MAX_SCORE))
}

/// Scores a constructed response from its recorded rubric levels.
///
/// With no recorded levels the response stays `Unscored`; a grader who
/// has recorded at least one level produces a partial score. The maximum
/// always covers every criterion, not just the graded ones.
pub fn score_constructed(rubric: &Rubric, rubric_scores: &[ResponseRubricScore]) -> ScoreState {
    let raw: u32 = rubric_scores
        .iter()
        .filter(|row| rubric.criterion(row.criterion_id).is_some())
        .map(|row| row.level_score as u32)
        .sum();
    let graded = rubric_scores
        .iter()
        .any(|row| rubric.criterion(row.criterion_id).is_some());
    if !graded {
        return ScoreState::Unscored;
    }
    ScoreState::scored(raw, rubric.max_score())
}

/// Checks a grader's level pick against the rubric before it is recorded.
pub fn validate_rubric_score(
    rubric: &Rubric,
    criterion_id: Uuid,
    level_score: u8,
) -> Result<(), RubricScoreError> {
    let criterion = rubric
        .criterion(criterion_id)
        .ok_or(RubricScoreError::UnknownCriterion { criterion_id })?;
    if !criterion.accepts(level_score) {
        return Err(RubricScoreError::LevelNotDefined {
            criterion: criterion.name.clone(),
            level_score,
        });
    }
    Ok(())
}

/// Writes a freshly computed score onto a response.
///
/// Always overwrites whatever was there, which is what makes batch
/// scoring idempotent and safe to re-run. A result of `Unscored`
/// clears `scored_at`: the response has been looked at but carries
/// no score.
pub fn apply_score(response: &mut Response, state: ScoreState, now: DateTime<Utc>) {
    response.scored_at = state.is_scored().then_some(now);
    response.score = state;
    response.updated_at = now;
}

/// Outcome counts from scoring a whole attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Responses that received a score (including re-scores).
    pub scored: u32,
    /// Responses skipped because scoring them failed.
    pub skipped: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, ItemChoice, RubricCriterion, RubricLevel};

    fn mcq_item() -> Item {
        let mut item = Item::new(
            "RC-001",
            ItemType::Mcq,
            Difficulty::Medium,
            "What does the author imply?",
            "inference",
        );
        let mut a = ItemChoice::new(1, "A");
        let mut b = ItemChoice::new(2, "B");
        let mut c = ItemChoice::new(3, "C");
        let d = ItemChoice::new(4, "D");
        a.is_correct = false;
        b.is_correct = true;
        c.proximity_score = Some(60);
        item.choices = vec![a, b, c, d];
        item
    }

    fn levels(max: u8) -> Vec<RubricLevel> {
        (0..=max)
            .map(|score| RubricLevel {
                score,
                descriptor: format!("level {score}"),
            })
            .collect()
    }

    #[test]
    fn correct_choice_earns_full_credit() {
        let item = mcq_item();
        let mut response = Response::new(Uuid::new_v4(), item.id);
        response.selected_choice_id = Some(item.choices[1].id);

        let state = score_mcq(&item, &response).unwrap();
        assert_eq!(
            state,
            ScoreState::Scored {
                raw_score: 100,
                max_score: 100,
                unanswered: false
            }
        );
    }

    #[test]
    fn proximity_choice_earns_partial_credit() {
        let item = mcq_item();
        let mut response = Response::new(Uuid::new_v4(), item.id);
        response.selected_choice_id = Some(item.choices[2].id);

        let state = score_mcq(&item, &response).unwrap();
        assert_eq!(
            state,
            ScoreState::Scored {
                raw_score: 60,
                max_score: 100,
                unanswered: false
            }
        );
    }

    #[test]
    fn wrong_choice_scores_zero() {
        let item = mcq_item();
        let mut response = Response::new(Uuid::new_v4(), item.id);
        response.selected_choice_id = Some(item.choices[0].id);

        let state = score_mcq(&item, &response).unwrap();
        assert_eq!(state, ScoreState::scored(0, 100));
    }

    #[test]
    fn no_selection_is_zero_and_unanswered() {
        let item = mcq_item();
        let response = Response::new(Uuid::new_v4(), item.id);

        let state = score_mcq(&item, &response).unwrap();
        assert_eq!(
            state,
            ScoreState::Scored {
                raw_score: 0,
                max_score: 100,
                unanswered: true
            }
        );
    }

    #[test]
    fn unknown_choice_is_an_error() {
        let item = mcq_item();
        let mut response = Response::new(Uuid::new_v4(), item.id);
        response.selected_choice_id = Some(Uuid::new_v4());

        let err = score_mcq(&item, &response).unwrap_err();
        assert!(matches!(err, ScoringError::UnknownChoice { .. }));
    }

    #[test]
    fn constructed_sums_levels_over_full_maximum() {
        let item_id = Uuid::new_v4();
        let rubric = Rubric::new(
            item_id,
            vec![
                RubricCriterion::new("evidence use", levels(3)),
                RubricCriterion::new("organization", levels(3)),
            ],
        );
        let response_id = Uuid::new_v4();
        let rows = vec![
            ResponseRubricScore::new(response_id, rubric.criteria[0].id, 2),
            ResponseRubricScore::new(response_id, rubric.criteria[1].id, 3),
        ];

        let state = score_constructed(&rubric, &rows);
        assert_eq!(state, ScoreState::scored(5, 6));
    }

    #[test]
    fn partially_graded_constructed_keeps_full_maximum() {
        let rubric = Rubric::new(
            Uuid::new_v4(),
            vec![
                RubricCriterion::new("evidence use", levels(3)),
                RubricCriterion::new("organization", levels(3)),
            ],
        );
        let rows = vec![ResponseRubricScore::new(
            Uuid::new_v4(),
            rubric.criteria[0].id,
            2,
        )];

        // One of two criteria graded: raw covers what was graded, max
        // still covers everything.
        assert_eq!(score_constructed(&rubric, &rows), ScoreState::scored(2, 6));
    }

    #[test]
    fn ungraded_constructed_stays_unscored() {
        let rubric = Rubric::new(
            Uuid::new_v4(),
            vec![RubricCriterion::new("evidence use", levels(3))],
        );
        assert_eq!(score_constructed(&rubric, &[]), ScoreState::Unscored);

        // Rows for criteria outside the rubric do not count as grading.
        let stray = vec![ResponseRubricScore::new(Uuid::new_v4(), Uuid::new_v4(), 2)];
        assert_eq!(score_constructed(&rubric, &stray), ScoreState::Unscored);
    }

    #[test]
    fn constructed_without_rubric_cannot_be_scored() {
        let item = Item::new(
            "CR-001",
            ItemType::Constructed,
            Difficulty::Hard,
            "Explain the author's argument.",
            "argumentation",
        );
        let response = Response::new(Uuid::new_v4(), item.id);

        let err = score_response(&item, &response, None, &[]).unwrap_err();
        assert!(matches!(err, ScoringError::MissingRubric { .. }));
    }

    #[test]
    fn rescoring_overwrites_in_place() {
        let item = mcq_item();
        let mut response = Response::new(Uuid::new_v4(), item.id);
        response.selected_choice_id = Some(item.choices[0].id);

        let first = score_mcq(&item, &response).unwrap();
        apply_score(&mut response, first, Utc::now());
        assert_eq!(response.score, ScoreState::scored(0, 100));

        response.selected_choice_id = Some(item.choices[1].id);
        let second = score_mcq(&item, &response).unwrap();
        apply_score(&mut response, second, Utc::now());
        assert_eq!(response.score, ScoreState::scored(100, 100));
        assert!(response.scored_at.is_some());
    }

    #[test]
    fn applying_unscored_clears_scored_at() {
        let mut response = Response::new(Uuid::new_v4(), Uuid::new_v4());
        apply_score(&mut response, ScoreState::scored(3, 6), Utc::now());
        assert!(response.scored_at.is_some());

        apply_score(&mut response, ScoreState::Unscored, Utc::now());
        assert_eq!(response.score, ScoreState::Unscored);
        assert!(response.scored_at.is_none());
    }

    #[test]
    fn rubric_score_validation() {
        let rubric = Rubric::new(
            Uuid::new_v4(),
            vec![RubricCriterion::new("clarity", levels(3))],
        );
        let criterion_id = rubric.criteria[0].id;

        validate_rubric_score(&rubric, criterion_id, 0).unwrap();
        validate_rubric_score(&rubric, criterion_id, 3).unwrap();

        let err = validate_rubric_score(&rubric, criterion_id, 4).unwrap_err();
        assert!(matches!(err, RubricScoreError::LevelNotDefined { .. }));

        let err = validate_rubric_score(&rubric, Uuid::new_v4(), 1).unwrap_err();
        assert!(matches!(err, RubricScoreError::UnknownCriterion { .. }));
    }
}
