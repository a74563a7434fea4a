//! Attempt-level score aggregation.
//!
//! A summary is recomputed from responses on demand and never stored, so
//! it can never drift from the scores it is derived from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::model::{AttemptStatus, Item, ItemType, Response, ScoreState, StudentAttempt};

/// One form item paired with whatever response the attempt holds for it.
#[derive(Debug, Clone, Copy)]
pub struct ItemResponse<'a> {
    pub item: &'a Item,
    pub response: Option<&'a Response>,
}

/// Aggregates for one sub-indicator area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaBreakdown {
    /// Sub-indicator code the items were tagged with.
    pub area: String,
    /// Items on the form in this area.
    pub items: u32,
    /// Raw points earned across scored responses.
    pub raw: u32,
    /// Maximum points across scored responses.
    pub max: u32,
    /// `raw / max` as a percentage, zero when nothing is scored yet.
    pub pct: f64,
}

/// Multiple-choice rollup for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McqStats {
    pub total: u32,
    pub answered: u32,
    pub unanswered: u32,
    /// Full-credit responses.
    pub correct: u32,
    /// Proximity-scored responses strictly between zero and full credit.
    pub partial: u32,
    /// Answered responses that scored zero.
    pub incorrect: u32,
    pub raw: u32,
    pub max: u32,
}

/// Constructed-response rollup for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructedStats {
    pub total: u32,
    /// Responses a grader has scored.
    pub graded: u32,
    /// Responses still waiting on a grader (or never answered).
    pub ungraded: u32,
    pub raw: u32,
    pub max: u32,
}

/// The full derived summary for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt_id: Uuid,
    pub student_id: Uuid,
    pub form_id: Uuid,
    pub status: AttemptStatus,
    /// Sum of raw scores over scored responses. Unscored responses are
    /// excluded entirely rather than counted as zero.
    pub total_raw: u32,
    pub total_max: u32,
    pub scored_responses: u32,
    pub unscored_responses: u32,
    /// Form items the student gave any answer to.
    pub answered_items: u32,
    /// Form items with no answer, including items never opened.
    pub unanswered_items: u32,
    /// `answered_items / form items`, zero for an empty form.
    pub completion_rate: f64,
    /// Per-area rollups, ordered by area code.
    pub areas: Vec<AreaBreakdown>,
    pub mcq: McqStats,
    pub constructed: ConstructedStats,
}

/// Computes the summary for one attempt from its form items and
/// responses.
///
/// `rows` should carry every item on the form, in form order, with the
/// attempt's response for that item when one exists.
pub fn summarize_attempt(attempt: &StudentAttempt, rows: &[ItemResponse<'_>]) -> AttemptSummary {
    let mut total_raw = 0u32;
    let mut total_max = 0u32;
    let mut scored_responses = 0u32;
    let mut unscored_responses = 0u32;
    let mut answered_items = 0u32;
    let mut unanswered_items = 0u32;
    let mut mcq = McqStats::default();
    let mut constructed = ConstructedStats::default();
    let mut by_area: BTreeMap<String, AreaBreakdown> = BTreeMap::new();

    for row in rows {
        let answered = row.response.is_some_and(|r| r.is_answered());
        if answered {
            answered_items += 1;
        } else {
            unanswered_items += 1;
        }

        let score = row.response.map(|r| r.score);
        if let Some(ScoreState::Scored {
            raw_score,
            max_score,
            ..
        }) = score
        {
            total_raw += raw_score;
            total_max += max_score;
            scored_responses += 1;
        } else if score == Some(ScoreState::Unscored) {
            unscored_responses += 1;
        }

        let area = by_area
            .entry(row.item.area.clone())
            .or_insert_with(|| AreaBreakdown {
                area: row.item.area.clone(),
                items: 0,
                raw: 0,
                max: 0,
                pct: 0.0,
            });
        area.items += 1;
        if let Some(ScoreState::Scored {
            raw_score,
            max_score,
            ..
        }) = score
        {
            area.raw += raw_score;
            area.max += max_score;
        }

        match row.item.item_type {
            ItemType::Mcq => {
                mcq.total += 1;
                if answered {
                    mcq.answered += 1;
                } else {
                    mcq.unanswered += 1;
                }
                if let Some(ScoreState::Scored {
                    raw_score,
                    max_score,
                    unanswered,
                }) = score
                {
                    mcq.raw += raw_score;
                    mcq.max += max_score;
                    if raw_score == max_score && max_score > 0 {
                        mcq.correct += 1;
                    } else if raw_score > 0 {
                        mcq.partial += 1;
                    } else if !unanswered {
                        mcq.incorrect += 1;
                    }
                }
            }
            ItemType::Constructed => {
                constructed.total += 1;
                match score {
                    Some(ScoreState::Scored {
                        raw_score,
                        max_score,
                        ..
                    }) => {
                        constructed.graded += 1;
                        constructed.raw += raw_score;
                        constructed.max += max_score;
                    }
                    _ => constructed.ungraded += 1,
                }
            }
        }
    }

    let mut areas: Vec<AreaBreakdown> = by_area.into_values().collect();
    for area in &mut areas {
        if area.max > 0 {
            area.pct = f64::from(area.raw) * 100.0 / f64::from(area.max);
        }
    }

    let completion_rate = if rows.is_empty() {
        0.0
    } else {
        f64::from(answered_items) / rows.len() as f64
    };

    AttemptSummary {
        attempt_id: attempt.id,
        student_id: attempt.student_id,
        form_id: attempt.form_id,
        status: attempt.status,
        total_raw,
        total_max,
        scored_responses,
        unscored_responses,
        answered_items,
        unanswered_items,
        completion_rate,
        areas,
        mcq,
        constructed,
    }
}
