//! Diagnostic form catalog. Read-only; forms come from seeding or the CLI.

use axum::extract::{Path, Query, State};
use axum::Json;
use rubricon_core::model::DiagnosticForm;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::pagination::{paginate, ListParams};
use crate::sort::parse_sort;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<Vec<DiagnosticForm>>>, ApiError> {
    let sort = parse_sort(params.sort.as_deref(), &["name", "created_at"], "name")?;
    let mut forms = state.store.list_forms().await;
    match sort.key {
        "created_at" => forms.sort_by_key(|f| f.created_at),
        _ => forms.sort_by(|a, b| a.name.cmp(&b.name)),
    }
    if sort.descending {
        forms.reverse();
    }
    let (rows, meta) = paginate(forms, params.page(), params.per_page());
    Ok(Json(Envelope::page(rows, meta)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<DiagnosticForm>>, ApiError> {
    Ok(Json(Envelope::data(state.store.get_form(id).await?)))
}
