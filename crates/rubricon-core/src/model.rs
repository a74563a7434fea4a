//! Core data model types for rubricon.
//!
//! These are the fundamental types that the entire rubricon system uses
//! to represent assessment items, rubrics, student attempts, and the
//! background jobs that score and report on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AttemptStateError, ItemLifecycleError};
use crate::report::SectionKey;
use crate::roles::Role;

/// Highest rubric level score accepted at authoring and import time.
///
/// Rubrics in circulation use both 0-3 and 0-4 scales; the superset
/// bound keeps both importable.
pub const MAX_LEVEL_SCORE: u8 = 4;

/// Full credit for a multiple-choice response, and the upper bound for
/// per-choice proximity scores.
pub const MCQ_MAX_SCORE: u32 = 100;

/// How a response to an item is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Multiple choice, scored automatically from the selected choice.
    Mcq,
    /// Constructed (free-text) response, scored by hand against a rubric.
    Constructed,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Mcq => write!(f, "mcq"),
            ItemType::Constructed => write!(f, "constructed"),
        }
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mcq" | "multiple_choice" => Ok(ItemType::Mcq),
            "constructed" | "constructed_response" => Ok(ItemType::Constructed),
            other => Err(format!("unknown item type: {other}")),
        }
    }
}

/// Authoring lifecycle of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Draft,
    Active,
    Retired,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Draft => write!(f, "draft"),
            ItemStatus::Active => write!(f, "active"),
            ItemStatus::Retired => write!(f, "retired"),
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ItemStatus::Draft),
            "active" => Ok(ItemStatus::Active),
            "retired" => Ok(ItemStatus::Retired),
            other => Err(format!("unknown item status: {other}")),
        }
    }
}

/// Authored difficulty band for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// One selectable answer on a multiple-choice item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemChoice {
    /// Unique identifier for this choice.
    pub id: Uuid,
    /// Position of the choice within the item (1-based, stable across edits).
    pub choice_no: u8,
    /// Text shown to the student.
    pub content: String,
    /// Whether this choice earns full credit.
    #[serde(default)]
    pub is_correct: bool,
    /// Partial credit (0-100) for near-miss choices. `None` means the
    /// choice scores full credit if correct, zero otherwise.
    #[serde(default)]
    pub proximity_score: Option<u32>,
}

impl ItemChoice {
    pub fn new(choice_no: u8, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            choice_no,
            content: content.into(),
            is_correct: false,
            proximity_score: None,
        }
    }
}

/// A single assessment question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier for this item.
    pub id: Uuid,
    /// Human-facing natural key (e.g. "RC-2024-013"), unique bank-wide.
    pub code: String,
    /// How responses to this item are evaluated.
    pub item_type: ItemType,
    /// Authoring lifecycle state.
    pub status: ItemStatus,
    /// Authored difficulty band.
    pub difficulty: Difficulty,
    /// Question text shown to the student.
    pub prompt: String,
    /// Sub-indicator code this item measures (e.g. "inference").
    pub area: String,
    /// Optional shared reading passage.
    #[serde(default)]
    pub stimulus_id: Option<Uuid>,
    /// Answer choices. Empty for constructed items.
    #[serde(default)]
    pub choices: Vec<ItemChoice>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(
        code: impl Into<String>,
        item_type: ItemType,
        difficulty: Difficulty,
        prompt: impl Into<String>,
        area: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            item_type,
            status: ItemStatus::Draft,
            difficulty,
            prompt: prompt.into(),
            area: area.into(),
            stimulus_id: None,
            choices: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn choice_by_id(&self, id: Uuid) -> Option<&ItemChoice> {
        self.choices.iter().find(|c| c.id == id)
    }

    pub fn choice_by_no(&self, choice_no: u8) -> Option<&ItemChoice> {
        self.choices.iter().find(|c| c.choice_no == choice_no)
    }

    /// Moves a draft item into active use.
    pub fn activate(&mut self) -> Result<(), ItemLifecycleError> {
        match self.status {
            ItemStatus::Draft => {
                self.status = ItemStatus::Active;
                self.updated_at = Utc::now();
                Ok(())
            }
            from => Err(ItemLifecycleError::InvalidTransition {
                from,
                to: ItemStatus::Active,
            }),
        }
    }

    /// Retires an active item. Retired items stay readable but are no
    /// longer placed on new forms.
    pub fn retire(&mut self) -> Result<(), ItemLifecycleError> {
        match self.status {
            ItemStatus::Active => {
                self.status = ItemStatus::Retired;
                self.updated_at = Utc::now();
                Ok(())
            }
            from => Err(ItemLifecycleError::InvalidTransition {
                from,
                to: ItemStatus::Retired,
            }),
        }
    }
}

/// One score level on a rubric criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricLevel {
    /// Points awarded when a response lands on this level.
    pub score: u8,
    /// What performance at this level looks like.
    pub descriptor: String,
}

/// One graded dimension of a constructed-response rubric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub id: Uuid,
    /// Criterion name (e.g. "evidence use"), unique within its rubric.
    pub name: String,
    /// Discrete score levels, lowest to highest.
    #[serde(default)]
    pub levels: Vec<RubricLevel>,
}

impl RubricCriterion {
    pub fn new(name: impl Into<String>, levels: Vec<RubricLevel>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            levels,
        }
    }

    /// Highest defined level score, or zero for an empty criterion.
    pub fn max_level(&self) -> u8 {
        self.levels.iter().map(|l| l.score).max().unwrap_or(0)
    }

    /// Whether `score` matches one of the defined discrete levels.
    pub fn accepts(&self, score: u8) -> bool {
        self.levels.iter().any(|l| l.score == score)
    }
}

/// Hand-scoring guide attached to a constructed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
    pub id: Uuid,
    /// The constructed item this rubric grades. One rubric per item.
    pub item_id: Uuid,
    #[serde(default)]
    pub criteria: Vec<RubricCriterion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rubric {
    pub fn new(item_id: Uuid, criteria: Vec<RubricCriterion>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            item_id,
            criteria,
            created_at: now,
            updated_at: now,
        }
    }

    /// Maximum attainable score: sum of every criterion's top level.
    pub fn max_score(&self) -> u32 {
        self.criteria.iter().map(|c| c.max_level() as u32).sum()
    }

    pub fn criterion(&self, id: Uuid) -> Option<&RubricCriterion> {
        self.criteria.iter().find(|c| c.id == id)
    }

    pub fn criterion_by_name(&self, name: &str) -> Option<&RubricCriterion> {
        self.criteria.iter().find(|c| c.name == name)
    }
}

/// A fixed, ordered selection of items administered as one assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticForm {
    pub id: Uuid,
    pub name: String,
    /// Items on the form, in presentation order.
    #[serde(default)]
    pub item_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl DiagnosticForm {
    pub fn new(name: impl Into<String>, item_ids: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            item_ids,
            created_at: Utc::now(),
        }
    }
}

/// A reading passage shared by one or more items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stimulus {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Stimulus {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

/// A named skill area items are tagged with (e.g. "inference",
/// "vocabulary in context"). Keyed by its code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubIndicator {
    pub code: String,
    pub name: String,
}

/// Where an attempt is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The student is still answering.
    InProgress,
    /// Every item on the form has a response, but nothing is final yet.
    Completed,
    /// The student handed the attempt in. Responses are frozen.
    Submitted,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::InProgress => write!(f, "in_progress"),
            AttemptStatus::Completed => write!(f, "completed"),
            AttemptStatus::Submitted => write!(f, "submitted"),
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "completed" => Ok(AttemptStatus::Completed),
            "submitted" => Ok(AttemptStatus::Submitted),
            other => Err(format!("unknown attempt status: {other}")),
        }
    }
}

/// One student sitting one diagnostic form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentAttempt {
    pub id: Uuid,
    pub student_id: Uuid,
    pub form_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl StudentAttempt {
    pub fn new(student_id: Uuid, form_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            form_id,
            status: AttemptStatus::InProgress,
            started_at: Utc::now(),
            submitted_at: None,
        }
    }

    /// Marks an in-progress attempt as fully answered.
    pub fn mark_completed(&mut self) {
        if self.status == AttemptStatus::InProgress {
            self.status = AttemptStatus::Completed;
        }
    }

    /// Hands the attempt in. Responses become read-only afterwards.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<(), AttemptStateError> {
        if self.status == AttemptStatus::Submitted {
            return Err(AttemptStateError::AlreadySubmitted { attempt_id: self.id });
        }
        self.status = AttemptStatus::Submitted;
        self.submitted_at = Some(now);
        Ok(())
    }

    pub fn is_submitted(&self) -> bool {
        self.status == AttemptStatus::Submitted
    }
}

/// Grade state of a single response.
///
/// `Unscored` is not the same thing as a scored zero: an unscored
/// constructed response still blocks report publication, a zero does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScoreState {
    /// No grade exists yet.
    Unscored,
    /// A grade has been recorded.
    Scored {
        raw_score: u32,
        max_score: u32,
        /// True when the student never selected a choice on an mcq item.
        unanswered: bool,
    },
}

impl ScoreState {
    pub fn scored(raw_score: u32, max_score: u32) -> Self {
        ScoreState::Scored {
            raw_score,
            max_score,
            unanswered: false,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, ScoreState::Scored { .. })
    }
}

impl Default for ScoreState {
    fn default() -> Self {
        ScoreState::Unscored
    }
}

/// One student's answer to one item within an attempt.
///
/// At most one response exists per (attempt, item) pair; re-answering
/// overwrites in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub item_id: Uuid,
    /// Selected choice for mcq items. `None` means no selection was made.
    #[serde(default)]
    pub selected_choice_id: Option<Uuid>,
    /// Free text for constructed items.
    #[serde(default)]
    pub answer_text: Option<String>,
    /// Current grade. Always derived by the evaluator or a grader, never
    /// authored directly.
    #[serde(default)]
    pub score: ScoreState,
    #[serde(default)]
    pub scored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Response {
    pub fn new(attempt_id: Uuid, item_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            attempt_id,
            item_id,
            selected_choice_id: None,
            answer_text: None,
            score: ScoreState::Unscored,
            scored_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the student gave any answer at all.
    pub fn is_answered(&self) -> bool {
        self.selected_choice_id.is_some()
            || self
                .answer_text
                .as_ref()
                .is_some_and(|t| !t.trim().is_empty())
    }
}

/// A grader's level pick for one rubric criterion on one response.
///
/// At most one row exists per (response, criterion) pair; re-grading
/// overwrites in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRubricScore {
    pub id: Uuid,
    pub response_id: Uuid,
    pub criterion_id: Uuid,
    /// The level score awarded. Must match a defined level on the criterion.
    pub level_score: u8,
    /// The grader who recorded this score.
    #[serde(default)]
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ResponseRubricScore {
    pub fn new(response_id: Uuid, criterion_id: Uuid, level_score: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            response_id,
            criterion_id,
            level_score,
            recorded_by: None,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle of a background job, and of the records jobs act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No job has touched this record yet.
    Idle,
    Queued,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What a background job does when a worker picks it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Re-evaluate every response on an attempt.
    ScoreAttempt { attempt_id: Uuid },
    /// Assemble all report sections for an attempt.
    GenerateReport { attempt_id: Uuid },
    /// Rebuild a single section of an existing report.
    RegenerateSection {
        attempt_id: Uuid,
        section: SectionKey,
    },
    /// Parse and apply an uploaded item-bank file.
    ImportItemBank { batch_id: Uuid },
}

/// A queued unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Delivery attempts so far, including the current one.
    #[serde(default)]
    pub attempts: u32,
    /// Message from the most recent failure, kept for operators.
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            status: JobStatus::Queued,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A platform account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Login name, unique platform-wide.
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// For student accounts, the parent account allowed to view their
    /// published reports.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            display_name: display_name.into(),
            role,
            parent_id: None,
            created_at: Utc::now(),
        }
    }
}

/// A bearer-token login session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    /// The role string as it was when the session was issued. Compared
    /// against the account's current role on every request; a mismatch
    /// invalidates the session.
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            token: Uuid::new_v4().simple().to_string(),
            user_id,
            role: role.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// One rejected row from an item-bank import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    /// 1-based line number in the uploaded file, counting the header.
    pub row: u32,
    pub message: String,
}

impl ImportRowError {
    pub fn new(row: u32, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

/// One uploaded item-bank file and the outcome of applying it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: Uuid,
    pub filename: String,
    /// Raw uploaded CSV, kept so the import job can parse it off-request.
    pub payload: String,
    pub status: JobStatus,
    #[serde(default)]
    pub items_created: u32,
    #[serde(default)]
    pub items_updated: u32,
    #[serde(default)]
    pub rows_skipped: u32,
    /// Per-row rejections. A batch can complete with some rows skipped.
    #[serde(default)]
    pub row_errors: Vec<ImportRowError>,
    /// Terminal failure message when the whole batch failed.
    #[serde(default)]
    pub job_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportBatch {
    pub fn new(filename: impl Into<String>, payload: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            payload: payload.into(),
            status: JobStatus::Queued,
            items_created: 0,
            items_updated: 0,
            rows_skipped: 0,
            row_errors: Vec::new(),
            job_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
