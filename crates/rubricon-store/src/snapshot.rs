//! JSON snapshot persistence for the store.
//!
//! The whole store serializes to one pretty-printed JSON file. Secondary
//! indexes are never written out; they are rebuilt from the rows on load.
//! Sessions are deliberately not persisted.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use rubricon_core::model::{
    DiagnosticForm, ImportBatch, Item, JobRecord, Response, ResponseRubricScore, Rubric, Stimulus,
    StudentAttempt, SubIndicator, User,
};
use rubricon_core::report::AttemptReport;

use crate::error::StoreError;
use crate::store::{Store, Tables};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    rubrics: Vec<Rubric>,
    #[serde(default)]
    forms: Vec<DiagnosticForm>,
    #[serde(default)]
    stimuli: Vec<Stimulus>,
    #[serde(default)]
    sub_indicators: Vec<SubIndicator>,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    attempts: Vec<StudentAttempt>,
    #[serde(default)]
    responses: Vec<Response>,
    #[serde(default)]
    rubric_scores: Vec<ResponseRubricScore>,
    #[serde(default)]
    reports: Vec<AttemptReport>,
    #[serde(default)]
    jobs: Vec<JobRecord>,
    #[serde(default)]
    batches: Vec<ImportBatch>,
}

impl Store {
    /// Writes the full store to `path` as pretty-printed JSON.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = {
            let t = self.tables.read().await;
            Snapshot {
                items: t.items.values().cloned().collect(),
                rubrics: t.rubrics.values().cloned().collect(),
                forms: t.forms.values().cloned().collect(),
                stimuli: t.stimuli.values().cloned().collect(),
                sub_indicators: t.sub_indicators.values().cloned().collect(),
                users: t.users.values().cloned().collect(),
                attempts: t.attempts.values().cloned().collect(),
                responses: t.responses.values().cloned().collect(),
                rubric_scores: t.rubric_scores.values().cloned().collect(),
                reports: t.reports.values().cloned().collect(),
                jobs: t.jobs.values().cloned().collect(),
                batches: t.batches.values().cloned().collect(),
            }
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), items = snapshot.items.len(), "store saved");
        Ok(())
    }

    /// Loads a store from a snapshot file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&json)?;
        let store = Store::from_snapshot(snapshot);
        Ok(store)
    }

    /// Loads a store from `path`, or starts empty when the file does not
    /// exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Store::new())
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut t = Tables::default();
        for item in snapshot.items {
            t.item_codes.insert(item.code.clone(), item.id);
            t.items.insert(item.id, item);
        }
        for rubric in snapshot.rubrics {
            t.rubric_items.insert(rubric.item_id, rubric.id);
            t.rubrics.insert(rubric.id, rubric);
        }
        for form in snapshot.forms {
            t.forms.insert(form.id, form);
        }
        for stimulus in snapshot.stimuli {
            t.stimuli.insert(stimulus.id, stimulus);
        }
        for sub_indicator in snapshot.sub_indicators {
            t.sub_indicators
                .insert(sub_indicator.code.clone(), sub_indicator);
        }
        for user in snapshot.users {
            t.usernames.insert(user.username.clone(), user.id);
            t.users.insert(user.id, user);
        }
        for attempt in snapshot.attempts {
            t.attempts.insert(attempt.id, attempt);
        }
        for response in snapshot.responses {
            t.response_slots
                .insert((response.attempt_id, response.item_id), response.id);
            t.responses.insert(response.id, response);
        }
        for score in snapshot.rubric_scores {
            t.rubric_scores
                .insert((score.response_id, score.criterion_id), score);
        }
        for report in snapshot.reports {
            t.report_attempts.insert(report.attempt_id, report.id);
            t.reports.insert(report.id, report);
        }
        for job in snapshot.jobs {
            t.jobs.insert(job.id, job);
        }
        for batch in snapshot.batches {
            t.batches.insert(batch.id, batch);
        }
        Store {
            tables: tokio::sync::RwLock::new(t),
        }
    }
}
