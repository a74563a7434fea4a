//! Prompt assembly for report section generation.
//!
//! Each section gets its own instruction plus a JSON digest of the
//! attempt summary. The digest is the single source of numbers: the
//! model is told to restate them, never to invent its own.

use serde_json::{json, Value};

use crate::report::SectionKey;
use crate::summary::AttemptSummary;

/// System prompt for all report prose generation.
pub const SYSTEM_PROMPT: &str = "You are an assessment feedback writer for a reading diagnostic platform. Write clear, encouraging prose for students, parents, and teachers. Use only the numbers given in the score digest; never invent scores, counts, or percentages. Respond with plain prose, no markdown headings and no code fences.";

/// The writing instruction for one section.
pub fn section_instruction(key: SectionKey) -> &'static str {
    match key {
        SectionKey::Overview => {
            "Write a two-paragraph overview of this attempt: overall score, \
             completion, and the general picture of the student's reading."
        }
        SectionKey::AreaBreakdown => {
            "Describe the student's performance in each skill area, naming \
             the strongest and weakest areas with their percentages."
        }
        SectionKey::McqAnalysis => {
            "Analyze the multiple-choice results: correct, partially correct, \
             incorrect, and unanswered counts, and what they suggest."
        }
        SectionKey::ConstructedAnalysis => {
            "Analyze the constructed-response results: how many were graded, \
             the points earned, and what the grading shows."
        }
        SectionKey::ReaderTendency => {
            "Characterize the student's tendencies as a reader from the \
             answering pattern: completion, skipped items, and area balance."
        }
        SectionKey::ComprehensiveOpinion => {
            "Give a comprehensive opinion on this attempt, weaving the area, \
             multiple-choice, and constructed-response results together."
        }
        SectionKey::Recommendations => {
            "Recommend two or three concrete next steps for this student, \
             grounded in the weakest areas of the digest."
        }
    }
}

/// Builds the full prompt for one section from the attempt summary.
pub fn section_prompt(key: SectionKey, summary: &AttemptSummary) -> String {
    let digest = serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{instruction}\n\nScore digest:\n{digest}\n\nWrite the \"{title}\" section now.",
        instruction = section_instruction(key),
        digest = digest,
        title = key.title(),
    )
}

/// The structured slice of the summary stored alongside a section's
/// prose, so renderers can show numbers without parsing text.
pub fn section_data(key: SectionKey, summary: &AttemptSummary) -> Value {
    match key {
        SectionKey::Overview => json!({
            "total_raw": summary.total_raw,
            "total_max": summary.total_max,
            "scored_responses": summary.scored_responses,
            "unscored_responses": summary.unscored_responses,
            "completion_rate": summary.completion_rate,
        }),
        SectionKey::AreaBreakdown => json!({ "areas": summary.areas }),
        SectionKey::McqAnalysis => json!({ "mcq": summary.mcq }),
        SectionKey::ConstructedAnalysis => json!({ "constructed": summary.constructed }),
        SectionKey::ReaderTendency => json!({
            "answered_items": summary.answered_items,
            "unanswered_items": summary.unanswered_items,
            "completion_rate": summary.completion_rate,
            "areas": summary.areas,
        }),
        SectionKey::ComprehensiveOpinion => json!({
            "total_raw": summary.total_raw,
            "total_max": summary.total_max,
            "areas": summary.areas,
            "mcq": summary.mcq,
            "constructed": summary.constructed,
        }),
        SectionKey::Recommendations => json!({
            "areas": summary.areas,
            "mcq": summary.mcq,
            "constructed": summary.constructed,
        }),
    }
}
