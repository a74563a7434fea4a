//! Report generation, publication, and the HTML export.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use rubricon_core::model::JobKind;
use rubricon_core::report::{AttemptReport, SectionKey};
use rubricon_core::roles::Capability;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::state::AppState;

/// Loads a report the caller may look at. Staff see everything;
/// students and parents only see published reports for their own (or
/// their child's) attempts, and drafts look like 404 to them.
async fn load_visible(
    state: &AppState,
    ctx: &RequestContext,
    attempt_id: Uuid,
) -> Result<AttemptReport, ApiError> {
    let attempt = state.store.get_attempt(attempt_id).await?;
    let report = state
        .store
        .report_for_attempt(attempt_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no report for attempt {attempt_id}")))?;
    if ctx.role.allows(Capability::ViewAllAttempts) {
        return Ok(report);
    }
    let published_only = |report: AttemptReport| {
        if report.is_published() {
            Ok(report)
        } else {
            Err(ApiError::NotFound("report is not published yet".into()))
        }
    };
    if attempt.student_id == ctx.user_id && ctx.role.allows(Capability::ViewOwnReports) {
        return published_only(report);
    }
    if ctx.role.allows(Capability::ViewChildReports) {
        let student = state.store.get_user(attempt.student_id).await?;
        if student.parent_id == Some(ctx.user_id) {
            return published_only(report);
        }
    }
    Err(ApiError::Forbidden("not allowed to view this report".into()))
}

/// Queues full report generation and hands back the job id.
pub async fn generate(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    ctx.require(Capability::GenerateReports)?;
    let attempt = state.store.get_attempt(id).await?;
    let job = state
        .jobs
        .enqueue(JobKind::GenerateReport {
            attempt_id: attempt.id,
        })
        .await;
    Ok(Json(Envelope::data(serde_json::json!({ "job_id": job.id }))))
}

pub async fn get(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<AttemptReport>>, ApiError> {
    Ok(Json(Envelope::data(load_visible(&state, &ctx, id).await?)))
}

/// Publishes a draft report. The unscored-response guard runs against
/// a fresh summary, not the counts cached on the report row, since
/// grading can continue after generation.
pub async fn publish(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<AttemptReport>>, ApiError> {
    ctx.require(Capability::PublishReports)?;
    let mut report = state
        .store
        .report_for_attempt(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no report for attempt {id}")))?;
    let summary = state.store.attempt_summary(id).await?;
    report.publish(summary.unscored_responses, Utc::now())?;
    state.store.put_report(report.clone()).await?;
    tracing::info!("published report for attempt {id}");
    Ok(Json(Envelope::data(report)))
}

pub async fn unpublish(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<AttemptReport>>, ApiError> {
    ctx.require(Capability::PublishReports)?;
    let mut report = state
        .store
        .report_for_attempt(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no report for attempt {id}")))?;
    report.unpublish()?;
    state.store.put_report(report.clone()).await?;
    Ok(Json(Envelope::data(report)))
}

/// Queues regeneration of a single section of an existing report.
pub async fn regenerate_section(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, key)): Path<(Uuid, String)>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    ctx.require(Capability::GenerateReports)?;
    let section =
        SectionKey::from_str(&key).map_err(|e| ApiError::validation("section", e))?;
    let attempt = state.store.get_attempt(id).await?;
    let job = state
        .jobs
        .enqueue(JobKind::RegenerateSection {
            attempt_id: attempt.id,
            section,
        })
        .await;
    Ok(Json(Envelope::data(serde_json::json!({ "job_id": job.id }))))
}

/// Renders the report as one self-contained HTML page. Not enveloped.
pub async fn export(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let report = load_visible(&state, &ctx, id).await?;
    let summary = state.store.attempt_summary(id).await?;
    let student_name = match state.store.get_user(summary.student_id).await {
        Ok(user) => user.display_name,
        Err(_) => "Student".to_string(),
    };
    let html = rubricon_export::render_html(&report, &summary, &student_name);
    Ok((
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    ))
}
