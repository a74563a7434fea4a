use axum::extract::{Path, State};
use axum::Json;
use rubricon_core::model::JobRecord;
use rubricon_core::roles::Capability;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::state::AppState;

/// Polling endpoint for queued work.
pub async fn get(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<JobRecord>>, ApiError> {
    ctx.require(Capability::ViewJobs)?;
    Ok(Json(Envelope::data(state.store.get_job(id).await?)))
}
