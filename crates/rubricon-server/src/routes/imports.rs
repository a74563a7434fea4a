//! Asynchronous item-bank import and the synchronous CSV exports.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use rubricon_core::model::{ImportBatch, JobKind};
use rubricon_core::roles::Capability;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub filename: Option<String>,
}

/// `POST /import/items`. Takes the raw CSV as the request body, stores
/// it on a batch record, and queues the parse-and-apply job.
pub async fn upload(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<UploadParams>,
    body: String,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    ctx.require(Capability::ImportItems)?;
    if body.trim().is_empty() {
        return Err(ApiError::validation("body", "empty import file"));
    }
    let filename = params.filename.unwrap_or_else(|| "upload.csv".to_string());
    let batch = ImportBatch::new(filename, body);
    let batch_id = batch.id;
    state.store.insert_batch(batch).await;
    let job = state
        .jobs
        .enqueue(JobKind::ImportItemBank { batch_id })
        .await;
    tracing::info!("queued item-bank import batch {batch_id}");
    Ok(Json(Envelope::data(serde_json::json!({
        "batch_id": batch_id,
        "job_id": job.id,
    }))))
}

pub async fn get_batch(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<ImportBatch>>, ApiError> {
    ctx.require(Capability::ImportItems)?;
    Ok(Json(Envelope::data(state.store.get_batch(id).await?)))
}

/// Blank import template with example rows. Not enveloped.
pub async fn template(ctx: RequestContext) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ExportItems)?;
    Ok(csv_response(rubricon_import::template_csv()))
}

/// The current item bank in the import layout, ready for editing and
/// re-import. Not enveloped.
pub async fn export_items(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ExportItems)?;
    let items = state.store.list_items().await;
    let rubrics: HashMap<Uuid, _> = state
        .store
        .list_rubrics()
        .await
        .into_iter()
        .map(|r| (r.item_id, r))
        .collect();
    let csv = rubricon_import::export_items(&items, &rubrics)
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    Ok(csv_response(csv))
}

fn csv_response(csv: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv)
}
