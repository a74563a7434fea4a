use axum::extract::State;
use axum::Json;
use rubricon_core::model::SubIndicator;

use crate::envelope::Envelope;
use crate::state::AppState;

/// The sub-indicator list is small and fixed; no pagination.
pub async fn list(State(state): State<AppState>) -> Json<Envelope<Vec<SubIndicator>>> {
    Json(Envelope::data(state.store.list_sub_indicators().await))
}
