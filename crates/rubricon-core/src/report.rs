//! Report sections and the draft/publish state machine.
//!
//! A report carries a fixed set of named sections. The set is closed on
//! purpose: renderers and exporters match on `SectionKey` exhaustively,
//! so a new section is a compile-visible change, not a stray map key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ReportError;
use crate::model::JobStatus;

/// The canonical report sections, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    Overview,
    AreaBreakdown,
    McqAnalysis,
    ConstructedAnalysis,
    ReaderTendency,
    ComprehensiveOpinion,
    Recommendations,
}

impl SectionKey {
    /// Every section, in the order reports present them.
    pub const ALL: [SectionKey; 7] = [
        SectionKey::Overview,
        SectionKey::AreaBreakdown,
        SectionKey::McqAnalysis,
        SectionKey::ConstructedAnalysis,
        SectionKey::ReaderTendency,
        SectionKey::ComprehensiveOpinion,
        SectionKey::Recommendations,
    ];

    /// Default display title for the section.
    pub fn title(&self) -> &'static str {
        match self {
            SectionKey::Overview => "Overview",
            SectionKey::AreaBreakdown => "Performance by Area",
            SectionKey::McqAnalysis => "Multiple-Choice Analysis",
            SectionKey::ConstructedAnalysis => "Constructed-Response Analysis",
            SectionKey::ReaderTendency => "Reader Tendency",
            SectionKey::ComprehensiveOpinion => "Comprehensive Opinion",
            SectionKey::Recommendations => "Recommendations",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Overview => "overview",
            SectionKey::AreaBreakdown => "area_breakdown",
            SectionKey::McqAnalysis => "mcq_analysis",
            SectionKey::ConstructedAnalysis => "constructed_analysis",
            SectionKey::ReaderTendency => "reader_tendency",
            SectionKey::ComprehensiveOpinion => "comprehensive_opinion",
            SectionKey::Recommendations => "recommendations",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "overview" => Ok(SectionKey::Overview),
            "area_breakdown" => Ok(SectionKey::AreaBreakdown),
            "mcq_analysis" => Ok(SectionKey::McqAnalysis),
            "constructed_analysis" => Ok(SectionKey::ConstructedAnalysis),
            "reader_tendency" => Ok(SectionKey::ReaderTendency),
            "comprehensive_opinion" => Ok(SectionKey::ComprehensiveOpinion),
            "recommendations" => Ok(SectionKey::Recommendations),
            other => Err(format!("unknown report section: {other}")),
        }
    }
}

/// One generated report section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    /// Display title, defaulting to the section key's title.
    pub title: String,
    /// Generated prose for this section.
    pub content: String,
    /// The structured numbers the prose was written from, kept alongside
    /// so renderers never re-derive them from text.
    #[serde(default)]
    pub data: serde_json::Value,
    pub generated_at: DateTime<Utc>,
}

/// The fixed section slots of a report. A slot is `None` until its
/// section has been generated at least once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSections {
    #[serde(default)]
    pub overview: Option<ReportSection>,
    #[serde(default)]
    pub area_breakdown: Option<ReportSection>,
    #[serde(default)]
    pub mcq_analysis: Option<ReportSection>,
    #[serde(default)]
    pub constructed_analysis: Option<ReportSection>,
    #[serde(default)]
    pub reader_tendency: Option<ReportSection>,
    #[serde(default)]
    pub comprehensive_opinion: Option<ReportSection>,
    #[serde(default)]
    pub recommendations: Option<ReportSection>,
}

impl ReportSections {
    pub fn get(&self, key: SectionKey) -> Option<&ReportSection> {
        match key {
            SectionKey::Overview => self.overview.as_ref(),
            SectionKey::AreaBreakdown => self.area_breakdown.as_ref(),
            SectionKey::McqAnalysis => self.mcq_analysis.as_ref(),
            SectionKey::ConstructedAnalysis => self.constructed_analysis.as_ref(),
            SectionKey::ReaderTendency => self.reader_tendency.as_ref(),
            SectionKey::ComprehensiveOpinion => self.comprehensive_opinion.as_ref(),
            SectionKey::Recommendations => self.recommendations.as_ref(),
        }
    }

    pub fn set(&mut self, key: SectionKey, section: ReportSection) {
        let slot = match key {
            SectionKey::Overview => &mut self.overview,
            SectionKey::AreaBreakdown => &mut self.area_breakdown,
            SectionKey::McqAnalysis => &mut self.mcq_analysis,
            SectionKey::ConstructedAnalysis => &mut self.constructed_analysis,
            SectionKey::ReaderTendency => &mut self.reader_tendency,
            SectionKey::ComprehensiveOpinion => &mut self.comprehensive_opinion,
            SectionKey::Recommendations => &mut self.recommendations,
        };
        *slot = Some(section);
    }

    /// Generated sections in canonical order.
    pub fn generated(&self) -> impl Iterator<Item = (SectionKey, &ReportSection)> {
        SectionKey::ALL
            .iter()
            .filter_map(|&key| self.get(key).map(|section| (key, section)))
    }

    pub fn generated_count(&self) -> usize {
        self.generated().count()
    }

    /// Whether at least one section has non-empty prose.
    pub fn has_content(&self) -> bool {
        self.generated()
            .any(|(_, section)| !section.content.trim().is_empty())
    }
}

/// Publication state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// No sections have ever been generated.
    None,
    /// Sections exist but only staff can see them.
    Draft,
    /// Visible to the student and their parent.
    Published,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::None => write!(f, "none"),
            ReportStatus::Draft => write!(f, "draft"),
            ReportStatus::Published => write!(f, "published"),
        }
    }
}

/// The assembled report for one student attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    pub id: Uuid,
    /// The attempt this report describes. One report per attempt.
    pub attempt_id: Uuid,
    pub status: ReportStatus,
    #[serde(default)]
    pub sections: ReportSections,
    /// Score aggregates captured at generation time.
    #[serde(default)]
    pub total_raw: u32,
    #[serde(default)]
    pub total_max: u32,
    #[serde(default)]
    pub scored_responses: u32,
    #[serde(default)]
    pub unscored_responses: u32,
    /// State of the most recent generation job for this report.
    pub job_status: JobStatus,
    /// Failure message from the most recent generation job, if it failed.
    #[serde(default)]
    pub job_error: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttemptReport {
    pub fn new(attempt_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            attempt_id,
            status: ReportStatus::None,
            sections: ReportSections::default(),
            total_raw: 0,
            total_max: 0,
            scored_responses: 0,
            unscored_responses: 0,
            job_status: JobStatus::Idle,
            job_error: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Writes one section. The first section moves the report out of
    /// `None` into `Draft`; a published report stays published.
    pub fn set_section(&mut self, key: SectionKey, section: ReportSection) {
        self.sections.set(key, section);
        if self.status == ReportStatus::None {
            self.status = ReportStatus::Draft;
        }
        self.updated_at = Utc::now();
    }

    /// Publishes a draft report.
    ///
    /// `unscored` is the attempt's current count of unscored responses;
    /// the caller supplies it because grading can continue after the
    /// report was generated.
    pub fn publish(&mut self, unscored: u32, now: DateTime<Utc>) -> Result<(), ReportError> {
        if self.status != ReportStatus::Draft {
            return Err(ReportError::InvalidTransition {
                from: self.status,
                to: ReportStatus::Published,
            });
        }
        if !self.sections.has_content() {
            return Err(ReportError::NoSections);
        }
        if unscored > 0 {
            return Err(ReportError::ScoringIncomplete { unscored });
        }
        self.status = ReportStatus::Published;
        self.published_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Pulls a published report back to draft. Sections are kept.
    pub fn unpublish(&mut self) -> Result<(), ReportError> {
        if self.status != ReportStatus::Published {
            return Err(ReportError::InvalidTransition {
                from: self.status,
                to: ReportStatus::Draft,
            });
        }
        self.status = ReportStatus::Draft;
        self.published_at = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_published(&self) -> bool {
        self.status == ReportStatus::Published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(text: &str) -> ReportSection {
        ReportSection {
            title: "Overview".into(),
            content: text.into(),
            data: serde_json::json!({}),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn section_key_order_is_stable() {
        let keys: Vec<&str> = SectionKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "overview",
                "area_breakdown",
                "mcq_analysis",
                "constructed_analysis",
                "reader_tendency",
                "comprehensive_opinion",
                "recommendations",
            ]
        );
    }

    #[test]
    fn section_key_parse_roundtrip() {
        for key in SectionKey::ALL {
            assert_eq!(key.as_str().parse::<SectionKey>().unwrap(), key);
        }
        assert!("summary".parse::<SectionKey>().is_err());
    }

    #[test]
    fn first_section_moves_report_to_draft() {
        let mut report = AttemptReport::new(Uuid::new_v4());
        assert_eq!(report.status, ReportStatus::None);

        report.set_section(SectionKey::Overview, section("Solid performance."));
        assert_eq!(report.status, ReportStatus::Draft);
        assert_eq!(report.sections.generated_count(), 1);
    }

    #[test]
    fn publish_requires_draft_with_content() {
        let mut report = AttemptReport::new(Uuid::new_v4());

        // No sections at all: still in None, transition is invalid.
        assert!(matches!(
            report.publish(0, Utc::now()),
            Err(ReportError::InvalidTransition { .. })
        ));

        report.set_section(SectionKey::Overview, section("   "));
        assert!(matches!(
            report.publish(0, Utc::now()),
            Err(ReportError::NoSections)
        ));

        report.set_section(SectionKey::Overview, section("Solid performance."));
        report.publish(0, Utc::now()).unwrap();
        assert!(report.is_published());
        assert!(report.published_at.is_some());
    }

    #[test]
    fn publish_blocked_while_scoring_incomplete() {
        let mut report = AttemptReport::new(Uuid::new_v4());
        report.set_section(SectionKey::Overview, section("Solid performance."));

        let err = report.publish(2, Utc::now()).unwrap_err();
        assert!(matches!(err, ReportError::ScoringIncomplete { unscored: 2 }));
        assert_eq!(report.status, ReportStatus::Draft);
    }

    #[test]
    fn unpublish_returns_to_draft_and_republish_works() {
        let mut report = AttemptReport::new(Uuid::new_v4());
        report.set_section(SectionKey::Overview, section("Solid performance."));
        report.publish(0, Utc::now()).unwrap();

        report.unpublish().unwrap();
        assert_eq!(report.status, ReportStatus::Draft);
        assert!(report.published_at.is_none());
        // Sections survive the round trip.
        assert_eq!(report.sections.generated_count(), 1);

        report.publish(0, Utc::now()).unwrap();
        assert!(report.is_published());
    }

    #[test]
    fn unpublish_requires_published() {
        let mut report = AttemptReport::new(Uuid::new_v4());
        assert!(report.unpublish().is_err());

        report.set_section(SectionKey::Overview, section("text"));
        assert!(report.unpublish().is_err());
    }

    #[test]
    fn regenerating_one_section_leaves_others_alone() {
        let mut report = AttemptReport::new(Uuid::new_v4());
        report.set_section(SectionKey::Overview, section("first"));
        report.set_section(SectionKey::Recommendations, section("read more"));

        report.set_section(SectionKey::Overview, section("rewritten"));
        assert_eq!(
            report.sections.get(SectionKey::Overview).unwrap().content,
            "rewritten"
        );
        assert_eq!(
            report
                .sections
                .get(SectionKey::Recommendations)
                .unwrap()
                .content,
            "read more"
        );
        assert!(report.sections.get(SectionKey::ReaderTendency).is_none());
    }
}
