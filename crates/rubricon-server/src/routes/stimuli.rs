use axum::extract::{Path, Query, State};
use axum::Json;
use rubricon_core::model::Stimulus;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::pagination::{paginate, ListParams};
use crate::sort::parse_sort;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<Vec<Stimulus>>>, ApiError> {
    let sort = parse_sort(params.sort.as_deref(), &["title", "created_at"], "title")?;
    let mut stimuli = state.store.list_stimuli().await;
    match sort.key {
        "created_at" => stimuli.sort_by_key(|s| s.created_at),
        _ => stimuli.sort_by(|a, b| a.title.cmp(&b.title)),
    }
    if sort.descending {
        stimuli.reverse();
    }
    let (rows, meta) = paginate(stimuli, params.page(), params.per_page());
    Ok(Json(Envelope::page(rows, meta)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Stimulus>>, ApiError> {
    Ok(Json(Envelope::data(state.store.get_stimulus(id).await?)))
}
