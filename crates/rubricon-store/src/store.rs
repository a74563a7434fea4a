//! The in-process entity store.
//!
//! Tables are plain maps behind one `RwLock`, with secondary indexes for
//! every natural key the system relies on (item code, username, one
//! response per (attempt, item) pair, one rubric score per (response,
//! criterion) pair, one report per attempt). Writers go through `put_*`
//! methods that enforce those keys the way database upserts and unique
//! constraints would: colliding writes either land on the existing row,
//! last write wins, or are rejected as violations.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use rubricon_core::model::{
    DiagnosticForm, ImportBatch, Item, JobRecord, Response, ResponseRubricScore, Rubric, Session,
    Stimulus, StudentAttempt, SubIndicator, User,
};
use rubricon_core::report::AttemptReport;
use rubricon_core::summary::{summarize_attempt, AttemptSummary, ItemResponse};

use crate::error::StoreError;

/// Whether a `put_*` call created a new row or landed on an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) items: HashMap<Uuid, Item>,
    pub(crate) item_codes: HashMap<String, Uuid>,
    pub(crate) rubrics: HashMap<Uuid, Rubric>,
    pub(crate) rubric_items: HashMap<Uuid, Uuid>,
    pub(crate) forms: HashMap<Uuid, DiagnosticForm>,
    pub(crate) stimuli: HashMap<Uuid, Stimulus>,
    pub(crate) sub_indicators: BTreeMap<String, SubIndicator>,
    pub(crate) users: HashMap<Uuid, User>,
    pub(crate) usernames: HashMap<String, Uuid>,
    pub(crate) sessions: HashMap<String, Session>,
    pub(crate) attempts: HashMap<Uuid, StudentAttempt>,
    pub(crate) responses: HashMap<Uuid, Response>,
    pub(crate) response_slots: HashMap<(Uuid, Uuid), Uuid>,
    pub(crate) rubric_scores: HashMap<(Uuid, Uuid), ResponseRubricScore>,
    pub(crate) reports: HashMap<Uuid, AttemptReport>,
    pub(crate) report_attempts: HashMap<Uuid, Uuid>,
    pub(crate) jobs: HashMap<Uuid, JobRecord>,
    pub(crate) batches: HashMap<Uuid, ImportBatch>,
}

/// Shared entity store. Cheap to clone behind an `Arc`.
#[derive(Debug, Default)]
pub struct Store {
    pub(crate) tables: RwLock<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // -- items ------------------------------------------------------------

    /// Inserts or updates an item. The item code is unique bank-wide;
    /// writing a code owned by a different item is a violation.
    pub async fn put_item(&self, item: Item) -> Result<Upserted, StoreError> {
        let mut t = self.tables.write().await;
        if let Some(&owner) = t.item_codes.get(&item.code) {
            if owner != item.id {
                return Err(StoreError::UniqueViolation {
                    entity: "item",
                    key: item.code.clone(),
                });
            }
        }
        let created = match t.items.get(&item.id).map(|previous| previous.code.clone()) {
            Some(previous_code) => {
                if previous_code != item.code {
                    t.item_codes.remove(&previous_code);
                }
                false
            }
            None => true,
        };
        t.item_codes.insert(item.code.clone(), item.id);
        t.items.insert(item.id, item);
        Ok(if created {
            Upserted::Created
        } else {
            Upserted::Updated
        })
    }

    pub async fn get_item(&self, id: Uuid) -> Result<Item, StoreError> {
        let t = self.tables.read().await;
        t.items
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("item", id))
    }

    pub async fn item_by_code(&self, code: &str) -> Option<Item> {
        let t = self.tables.read().await;
        t.item_codes.get(code).and_then(|id| t.items.get(id)).cloned()
    }

    pub async fn list_items(&self) -> Vec<Item> {
        self.tables.read().await.items.values().cloned().collect()
    }

    // -- rubrics ----------------------------------------------------------

    /// Inserts or replaces the rubric for an item. One rubric per item:
    /// writing a new rubric for an item discards the previous one.
    pub async fn put_rubric(&self, rubric: Rubric) -> Result<Upserted, StoreError> {
        let mut t = self.tables.write().await;
        let replaced = match t.rubric_items.get(&rubric.item_id).copied() {
            Some(existing_id) if existing_id != rubric.id => {
                t.rubrics.remove(&existing_id);
                true
            }
            Some(_) => true,
            None => false,
        };
        t.rubric_items.insert(rubric.item_id, rubric.id);
        t.rubrics.insert(rubric.id, rubric);
        Ok(if replaced {
            Upserted::Updated
        } else {
            Upserted::Created
        })
    }

    pub async fn rubric_for_item(&self, item_id: Uuid) -> Option<Rubric> {
        let t = self.tables.read().await;
        t.rubric_items
            .get(&item_id)
            .and_then(|id| t.rubrics.get(id))
            .cloned()
    }

    pub async fn list_rubrics(&self) -> Vec<Rubric> {
        self.tables.read().await.rubrics.values().cloned().collect()
    }

    // -- forms, stimuli, sub-indicators -----------------------------------

    pub async fn put_form(&self, form: DiagnosticForm) {
        self.tables.write().await.forms.insert(form.id, form);
    }

    pub async fn get_form(&self, id: Uuid) -> Result<DiagnosticForm, StoreError> {
        let t = self.tables.read().await;
        t.forms
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("form", id))
    }

    pub async fn list_forms(&self) -> Vec<DiagnosticForm> {
        self.tables.read().await.forms.values().cloned().collect()
    }

    pub async fn put_stimulus(&self, stimulus: Stimulus) {
        self.tables.write().await.stimuli.insert(stimulus.id, stimulus);
    }

    pub async fn get_stimulus(&self, id: Uuid) -> Result<Stimulus, StoreError> {
        let t = self.tables.read().await;
        t.stimuli
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("stimulus", id))
    }

    pub async fn list_stimuli(&self) -> Vec<Stimulus> {
        self.tables.read().await.stimuli.values().cloned().collect()
    }

    pub async fn put_sub_indicator(&self, sub_indicator: SubIndicator) {
        self.tables
            .write()
            .await
            .sub_indicators
            .insert(sub_indicator.code.clone(), sub_indicator);
    }

    /// Sub-indicators in code order.
    pub async fn list_sub_indicators(&self) -> Vec<SubIndicator> {
        self.tables
            .read()
            .await
            .sub_indicators
            .values()
            .cloned()
            .collect()
    }

    // -- users and sessions -----------------------------------------------

    /// Inserts or updates a user. Usernames are unique platform-wide.
    pub async fn put_user(&self, user: User) -> Result<Upserted, StoreError> {
        let mut t = self.tables.write().await;
        if let Some(&owner) = t.usernames.get(&user.username) {
            if owner != user.id {
                return Err(StoreError::UniqueViolation {
                    entity: "user",
                    key: user.username.clone(),
                });
            }
        }
        let created = match t.users.get(&user.id).map(|previous| previous.username.clone()) {
            Some(previous_username) => {
                if previous_username != user.username {
                    t.usernames.remove(&previous_username);
                }
                false
            }
            None => true,
        };
        t.usernames.insert(user.username.clone(), user.id);
        t.users.insert(user.id, user);
        Ok(if created {
            Upserted::Created
        } else {
            Upserted::Updated
        })
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        let t = self.tables.read().await;
        t.users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    pub async fn user_by_username(&self, username: &str) -> Option<User> {
        let t = self.tables.read().await;
        t.usernames
            .get(username)
            .and_then(|id| t.users.get(id))
            .cloned()
    }

    pub async fn list_users(&self) -> Vec<User> {
        self.tables.read().await.users.values().cloned().collect()
    }

    pub async fn insert_session(&self, session: Session) {
        self.tables
            .write()
            .await
            .sessions
            .insert(session.token.clone(), session);
    }

    pub async fn get_session(&self, token: &str) -> Option<Session> {
        self.tables.read().await.sessions.get(token).cloned()
    }

    pub async fn delete_session(&self, token: &str) -> bool {
        self.tables.write().await.sessions.remove(token).is_some()
    }

    // -- attempts and responses -------------------------------------------

    pub async fn put_attempt(&self, attempt: StudentAttempt) {
        self.tables.write().await.attempts.insert(attempt.id, attempt);
    }

    pub async fn get_attempt(&self, id: Uuid) -> Result<StudentAttempt, StoreError> {
        let t = self.tables.read().await;
        t.attempts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("attempt", id))
    }

    pub async fn list_attempts(&self) -> Vec<StudentAttempt> {
        self.tables.read().await.attempts.values().cloned().collect()
    }

    /// Inserts or updates a response. At most one response exists per
    /// (attempt, item) pair: a second write for the same pair lands on
    /// the existing row, keeping its id and creation time. Last write
    /// wins, which is exactly what concurrent double-submits need.
    pub async fn put_response(&self, mut response: Response) -> Result<(Response, Upserted), StoreError> {
        let mut t = self.tables.write().await;
        let slot = (response.attempt_id, response.item_id);
        match t.response_slots.get(&slot).copied() {
            Some(existing_id) => {
                if let Some(previous) = t.responses.get(&existing_id) {
                    response.id = existing_id;
                    response.created_at = previous.created_at;
                }
                t.responses.insert(response.id, response.clone());
                Ok((response, Upserted::Updated))
            }
            None => {
                t.response_slots.insert(slot, response.id);
                t.responses.insert(response.id, response.clone());
                Ok((response, Upserted::Created))
            }
        }
    }

    pub async fn get_response(&self, id: Uuid) -> Result<Response, StoreError> {
        let t = self.tables.read().await;
        t.responses
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("response", id))
    }

    pub async fn response_for(&self, attempt_id: Uuid, item_id: Uuid) -> Option<Response> {
        let t = self.tables.read().await;
        t.response_slots
            .get(&(attempt_id, item_id))
            .and_then(|id| t.responses.get(id))
            .cloned()
    }

    pub async fn responses_for_attempt(&self, attempt_id: Uuid) -> Vec<Response> {
        self.tables
            .read()
            .await
            .responses
            .values()
            .filter(|r| r.attempt_id == attempt_id)
            .cloned()
            .collect()
    }

    /// Inserts or updates a rubric score. At most one row exists per
    /// (response, criterion) pair; re-grading overwrites the level.
    pub async fn put_rubric_score(
        &self,
        mut score: ResponseRubricScore,
    ) -> Result<(ResponseRubricScore, Upserted), StoreError> {
        let mut t = self.tables.write().await;
        let key = (score.response_id, score.criterion_id);
        let outcome = match t.rubric_scores.get(&key) {
            Some(existing) => {
                score.id = existing.id;
                Upserted::Updated
            }
            None => Upserted::Created,
        };
        t.rubric_scores.insert(key, score.clone());
        Ok((score, outcome))
    }

    pub async fn rubric_scores_for_response(&self, response_id: Uuid) -> Vec<ResponseRubricScore> {
        self.tables
            .read()
            .await
            .rubric_scores
            .values()
            .filter(|s| s.response_id == response_id)
            .cloned()
            .collect()
    }

    /// Assembles the scoring summary for an attempt in one pass: the
    /// attempt row, its form's items in form order, and whatever
    /// responses exist so far. Form entries pointing at items missing
    /// from the bank are skipped.
    pub async fn attempt_summary(&self, attempt_id: Uuid) -> Result<AttemptSummary, StoreError> {
        let t = self.tables.read().await;
        let attempt = t
            .attempts
            .get(&attempt_id)
            .ok_or_else(|| StoreError::not_found("attempt", attempt_id))?;
        let form = t
            .forms
            .get(&attempt.form_id)
            .ok_or_else(|| StoreError::not_found("form", attempt.form_id))?;
        let rows: Vec<ItemResponse<'_>> = form
            .item_ids
            .iter()
            .filter_map(|item_id| {
                let item = t.items.get(item_id)?;
                let response = t
                    .response_slots
                    .get(&(attempt_id, *item_id))
                    .and_then(|id| t.responses.get(id));
                Some(ItemResponse { item, response })
            })
            .collect();
        Ok(summarize_attempt(attempt, &rows))
    }

    // -- reports ----------------------------------------------------------

    /// Inserts or updates a report. One report per attempt: creating a
    /// second report for an attempt is a violation (callers should update
    /// the existing one instead).
    pub async fn put_report(&self, report: AttemptReport) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if let Some(&owner) = t.report_attempts.get(&report.attempt_id) {
            if owner != report.id {
                return Err(StoreError::UniqueViolation {
                    entity: "report",
                    key: report.attempt_id.to_string(),
                });
            }
        }
        t.report_attempts.insert(report.attempt_id, report.id);
        t.reports.insert(report.id, report);
        Ok(())
    }

    pub async fn report_for_attempt(&self, attempt_id: Uuid) -> Option<AttemptReport> {
        let t = self.tables.read().await;
        t.report_attempts
            .get(&attempt_id)
            .and_then(|id| t.reports.get(id))
            .cloned()
    }

    pub async fn update_report<F>(&self, id: Uuid, f: F) -> Result<AttemptReport, StoreError>
    where
        F: FnOnce(&mut AttemptReport),
    {
        let mut t = self.tables.write().await;
        let report = t
            .reports
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("report", id))?;
        f(report);
        report.updated_at = Utc::now();
        Ok(report.clone())
    }

    // -- jobs and import batches ------------------------------------------

    pub async fn insert_job(&self, job: JobRecord) {
        self.tables.write().await.jobs.insert(job.id, job);
    }

    pub async fn get_job(&self, id: Uuid) -> Result<JobRecord, StoreError> {
        let t = self.tables.read().await;
        t.jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("job", id))
    }

    pub async fn update_job<F>(&self, id: Uuid, f: F) -> Result<JobRecord, StoreError>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut t = self.tables.write().await;
        let job = t
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("job", id))?;
        f(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    pub async fn insert_batch(&self, batch: ImportBatch) {
        self.tables.write().await.batches.insert(batch.id, batch);
    }

    pub async fn get_batch(&self, id: Uuid) -> Result<ImportBatch, StoreError> {
        let t = self.tables.read().await;
        t.batches
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("import batch", id))
    }

    pub async fn update_batch<F>(&self, id: Uuid, f: F) -> Result<ImportBatch, StoreError>
    where
        F: FnOnce(&mut ImportBatch),
    {
        let mut t = self.tables.write().await;
        let batch = t
            .batches
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("import batch", id))?;
        f(batch);
        batch.updated_at = Utc::now();
        Ok(batch.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubricon_core::model::{Difficulty, ItemType, JobKind, JobStatus, ScoreState};
    use rubricon_core::roles::Role;

    fn item(code: &str) -> Item {
        Item::new(code, ItemType::Mcq, Difficulty::Easy, "Q?", "inference")
    }

    #[tokio::test]
    async fn item_codes_are_unique() {
        let store = Store::new();
        let first = item("RC-001");
        store.put_item(first.clone()).await.unwrap();

        // Same code, different item: rejected.
        let err = store.put_item(item("RC-001")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));

        // Same item again: plain update.
        let mut updated = first.clone();
        updated.prompt = "Reworded?".into();
        assert_eq!(store.put_item(updated).await.unwrap(), Upserted::Updated);
        assert_eq!(store.get_item(first.id).await.unwrap().prompt, "Reworded?");
    }

    #[tokio::test]
    async fn item_code_change_moves_the_index() {
        let store = Store::new();
        let mut it = item("RC-001");
        store.put_item(it.clone()).await.unwrap();

        it.code = "RC-001R".into();
        store.put_item(it.clone()).await.unwrap();

        assert!(store.item_by_code("RC-001").await.is_none());
        assert_eq!(store.item_by_code("RC-001R").await.unwrap().id, it.id);
        // The old code is free for reuse now.
        store.put_item(item("RC-001")).await.unwrap();
    }

    #[tokio::test]
    async fn one_response_per_attempt_item_pair() {
        let store = Store::new();
        let attempt_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();

        let first = Response::new(attempt_id, item_id);
        let (stored_first, outcome) = store.put_response(first.clone()).await.unwrap();
        assert_eq!(outcome, Upserted::Created);

        // A concurrent second create for the same pair lands on the first
        // row: same id, last write wins.
        let mut second = Response::new(attempt_id, item_id);
        second.answer_text = Some("changed my mind".into());
        let (stored_second, outcome) = store.put_response(second).await.unwrap();
        assert_eq!(outcome, Upserted::Updated);
        assert_eq!(stored_second.id, stored_first.id);
        assert_eq!(stored_second.created_at, stored_first.created_at);

        assert_eq!(store.responses_for_attempt(attempt_id).await.len(), 1);
        assert_eq!(
            store
                .response_for(attempt_id, item_id)
                .await
                .unwrap()
                .answer_text
                .as_deref(),
            Some("changed my mind")
        );
    }

    #[tokio::test]
    async fn rubric_scores_overwrite_per_criterion() {
        let store = Store::new();
        let response_id = Uuid::new_v4();
        let criterion_id = Uuid::new_v4();

        let (first, outcome) = store
            .put_rubric_score(ResponseRubricScore::new(response_id, criterion_id, 1))
            .await
            .unwrap();
        assert_eq!(outcome, Upserted::Created);

        let (second, outcome) = store
            .put_rubric_score(ResponseRubricScore::new(response_id, criterion_id, 3))
            .await
            .unwrap();
        assert_eq!(outcome, Upserted::Updated);
        assert_eq!(second.id, first.id);

        let rows = store.rubric_scores_for_response(response_id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level_score, 3);
    }

    #[tokio::test]
    async fn replacing_a_rubric_discards_the_old_one() {
        let store = Store::new();
        let item_id = Uuid::new_v4();
        let old = Rubric::new(item_id, vec![]);
        store.put_rubric(old.clone()).await.unwrap();

        let new = Rubric::new(item_id, vec![]);
        store.put_rubric(new.clone()).await.unwrap();

        assert_eq!(store.rubric_for_item(item_id).await.unwrap().id, new.id);
        assert_eq!(store.list_rubrics().await.len(), 1);
    }

    #[tokio::test]
    async fn one_report_per_attempt() {
        let store = Store::new();
        let attempt_id = Uuid::new_v4();
        store
            .put_report(AttemptReport::new(attempt_id))
            .await
            .unwrap();

        let err = store
            .put_report(AttemptReport::new(attempt_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
        assert!(store.report_for_attempt(attempt_id).await.is_some());
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = Store::new();
        store
            .put_user(User::new("amara", "Amara K", Role::Teacher))
            .await
            .unwrap();
        let err = store
            .put_user(User::new("amara", "Other Amara", Role::Student))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn sessions_round_trip_and_delete() {
        let store = Store::new();
        let user = User::new("noor", "Noor S", Role::Student);
        let session = Session::new(user.id, user.role);
        store.insert_session(session.clone()).await;

        assert_eq!(
            store.get_session(&session.token).await.unwrap().user_id,
            user.id
        );
        assert!(store.delete_session(&session.token).await);
        assert!(!store.delete_session(&session.token).await);
        assert!(store.get_session(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn job_updates_apply_under_the_lock() {
        let store = Store::new();
        let job = JobRecord::new(JobKind::ScoreAttempt {
            attempt_id: Uuid::new_v4(),
        });
        store.insert_job(job.clone()).await;

        let updated = store
            .update_job(job.id, |j| {
                j.status = JobStatus::Running;
                j.attempts += 1;
            })
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Running);
        assert_eq!(updated.attempts, 1);

        let missing = store.update_job(Uuid::new_v4(), |_| {}).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn attempt_summary_joins_form_items_and_responses() {
        let store = Store::new();
        let mcq = item("RC-001");
        store.put_item(mcq.clone()).await.unwrap();

        // The form also lists an item nobody ever imported.
        let ghost_id = Uuid::new_v4();
        let form = DiagnosticForm::new("Grade 5 Form A", vec![mcq.id, ghost_id]);
        store.put_form(form.clone()).await;

        let attempt = StudentAttempt::new(Uuid::new_v4(), form.id);
        store.put_attempt(attempt.clone()).await;

        let mut response = Response::new(attempt.id, mcq.id);
        response.selected_choice_id = Some(Uuid::new_v4());
        response.score = ScoreState::scored(100, 100);
        store.put_response(response).await.unwrap();

        let summary = store.attempt_summary(attempt.id).await.unwrap();
        assert_eq!(summary.attempt_id, attempt.id);
        assert_eq!(summary.mcq.total, 1);
        assert_eq!(summary.total_raw, 100);
        assert_eq!(summary.scored_responses, 1);

        let err = store.attempt_summary(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn scores_survive_response_overwrite_only_when_rewritten() {
        let store = Store::new();
        let attempt_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();

        let mut response = Response::new(attempt_id, item_id);
        response.score = ScoreState::scored(60, 100);
        store.put_response(response).await.unwrap();

        // A re-answer writes a fresh row state; the caller decides what
        // score state it carries (normally Unscored until re-evaluated).
        let replacement = Response::new(attempt_id, item_id);
        let (stored, _) = store.put_response(replacement).await.unwrap();
        assert_eq!(stored.score, ScoreState::Unscored);
    }
}
