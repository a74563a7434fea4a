//! The attempt flow: starting, answering, submitting, grading and
//! kicking off batch scoring.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use rubricon_core::model::{
    AttemptStatus, ItemType, JobKind, Response, ResponseRubricScore, StudentAttempt,
};
use rubricon_core::roles::Capability;
use rubricon_core::scoring::validate_rubric_score;
use rubricon_core::summary::AttemptSummary;
use serde::Deserialize;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::envelope::{Envelope, Meta};
use crate::error::ApiError;
use crate::pagination::{keyset_page, paginate, Cursor, KeysetParams, ListParams};
use crate::sort::{attempt_status_rank, parse_sort};
use crate::state::AppState;

/// Loads an attempt the caller may look at: staff with
/// `ViewAllAttempts`, or the student who owns it.
pub(crate) async fn load_visible(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
) -> Result<StudentAttempt, ApiError> {
    let attempt = state.store.get_attempt(id).await?;
    if ctx.role.allows(Capability::ViewAllAttempts) || attempt.student_id == ctx.user_id {
        Ok(attempt)
    } else {
        Err(ApiError::Forbidden("not allowed to view this attempt".into()))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAttempt {
    pub form_id: Uuid,
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<CreateAttempt>,
) -> Result<Json<Envelope<StudentAttempt>>, ApiError> {
    ctx.require(Capability::AttemptOwn)?;
    let form = state
        .store
        .get_form(body.form_id)
        .await
        .map_err(|_| ApiError::validation("form_id", "unknown form"))?;
    let attempt = StudentAttempt::new(ctx.user_id, form.id);
    state.store.put_attempt(attempt.clone()).await;
    Ok(Json(Envelope::data(attempt)))
}

pub async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<Vec<StudentAttempt>>>, ApiError> {
    let sort = parse_sort(
        params.sort.as_deref(),
        &["started_at", "status"],
        "started_at",
    )?;
    let mut attempts = state.store.list_attempts().await;
    if !ctx.role.allows(Capability::ViewAllAttempts) {
        ctx.require(Capability::AttemptOwn)?;
        attempts.retain(|a| a.student_id == ctx.user_id);
    }
    match sort.key {
        "status" => attempts.sort_by_key(|a| attempt_status_rank(a.status)),
        _ => attempts.sort_by_key(|a| a.started_at),
    }
    if sort.descending {
        attempts.reverse();
    }
    let (rows, meta) = paginate(attempts, params.page(), params.per_page());
    Ok(Json(Envelope::page(rows, meta)))
}

pub async fn get(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<StudentAttempt>>, ApiError> {
    Ok(Json(Envelope::data(load_visible(&state, &ctx, id).await?)))
}

pub async fn submit(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<StudentAttempt>>, ApiError> {
    ctx.require(Capability::AttemptOwn)?;
    let mut attempt = state.store.get_attempt(id).await?;
    if attempt.student_id != ctx.user_id {
        return Err(ApiError::Forbidden("not your attempt".into()));
    }
    attempt.mark_completed();
    attempt.submit(Utc::now())?;
    state.store.put_attempt(attempt.clone()).await;
    Ok(Json(Envelope::data(attempt)))
}

#[derive(Debug, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub selected_choice_id: Option<Uuid>,
    #[serde(default)]
    pub answer_text: Option<String>,
}

/// Upserts the caller's answer for one item. Re-answering resets the
/// score: score state is derived by the evaluator, never authored.
pub async fn upsert_response(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ResponsePayload>,
) -> Result<Json<Envelope<Response>>, ApiError> {
    ctx.require(Capability::AttemptOwn)?;
    let attempt = state.store.get_attempt(id).await?;
    if attempt.student_id != ctx.user_id {
        return Err(ApiError::Forbidden("not your attempt".into()));
    }
    if attempt.status != AttemptStatus::InProgress {
        return Err(ApiError::invalid("attempt is no longer accepting answers"));
    }
    let form = state.store.get_form(attempt.form_id).await?;
    if !form.item_ids.contains(&item_id) {
        return Err(ApiError::validation("item_id", "item is not on this form"));
    }
    let item = state.store.get_item(item_id).await?;
    if let Some(choice_id) = body.selected_choice_id {
        if item.item_type != ItemType::Mcq {
            return Err(ApiError::validation(
                "selected_choice_id",
                "only mcq items take a selected choice",
            ));
        }
        if item.choice_by_id(choice_id).is_none() {
            return Err(ApiError::validation(
                "selected_choice_id",
                "choice does not belong to this item",
            ));
        }
    }
    let mut response = Response::new(attempt.id, item.id);
    response.selected_choice_id = body.selected_choice_id;
    response.answer_text = body.answer_text;
    let (saved, _) = state.store.put_response(response).await?;
    Ok(Json(Envelope::data(saved)))
}

pub async fn list_responses(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Query(params): Query<KeysetParams>,
) -> Result<Json<Envelope<Vec<Response>>>, ApiError> {
    let attempt = load_visible(&state, &ctx, id).await?;
    let mut responses = state.store.responses_for_attempt(attempt.id).await;
    responses.sort_by_key(|r| Cursor::new(r.created_at, r.id));
    let page = keyset_page(responses, &params, |r| Cursor::new(r.created_at, r.id))?;
    Ok(Json(Envelope::page(
        page.rows,
        Meta::Keyset {
            next_cursor: page.next_cursor,
            prev_cursor: page.prev_cursor,
        },
    )))
}

#[derive(Debug, Deserialize)]
pub struct RubricScorePayload {
    pub criterion_id: Uuid,
    pub level_score: u8,
}

/// Records a grader's level pick for one criterion of a constructed
/// response. Re-grading the same criterion overwrites the level.
pub async fn record_rubric_score(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(body): Json<RubricScorePayload>,
) -> Result<Json<Envelope<ResponseRubricScore>>, ApiError> {
    ctx.require(Capability::GradeResponses)?;
    let response = state.store.get_response(id).await?;
    let item = state.store.get_item(response.item_id).await?;
    if item.item_type != ItemType::Constructed {
        return Err(ApiError::invalid("only constructed responses take rubric scores"));
    }
    let rubric = state
        .store
        .rubric_for_item(item.id)
        .await
        .ok_or_else(|| ApiError::invalid(format!("item {} has no rubric", item.code)))?;
    validate_rubric_score(&rubric, body.criterion_id, body.level_score)?;
    let mut row = ResponseRubricScore::new(response.id, body.criterion_id, body.level_score);
    row.recorded_by = Some(ctx.user_id);
    let (saved, _) = state.store.put_rubric_score(row).await?;
    Ok(Json(Envelope::data(saved)))
}

pub async fn summary(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<AttemptSummary>>, ApiError> {
    let attempt = load_visible(&state, &ctx, id).await?;
    let summary = state.store.attempt_summary(attempt.id).await?;
    Ok(Json(Envelope::data(summary)))
}

/// Queues a batch scoring job and hands back its id for polling.
pub async fn score(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    ctx.require(Capability::RunScoring)?;
    let attempt = state.store.get_attempt(id).await?;
    let job = state
        .jobs
        .enqueue(JobKind::ScoreAttempt {
            attempt_id: attempt.id,
        })
        .await;
    Ok(Json(Envelope::data(serde_json::json!({ "job_id": job.id }))))
}
