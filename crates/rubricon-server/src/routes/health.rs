use axum::Json;

use crate::envelope::Envelope;

pub async fn health() -> Json<Envelope<serde_json::Value>> {
    Json(Envelope::data(serde_json::json!({ "status": "ok" })))
}
