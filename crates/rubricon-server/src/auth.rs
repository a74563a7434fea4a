//! Login, logout, and the bearer-token middleware.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use rubricon_core::model::{Session, User};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the bearer token into a [`RequestContext`] or rejects the
/// request. Sessions snapshot the role at login; if the account's role
/// has changed since, the session is discarded and the caller must log
/// in again.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("login required".into()))?
        .to_string();
    let session = state
        .store
        .get_session(&token)
        .await
        .ok_or_else(|| ApiError::Unauthorized("session expired or unknown".into()))?;
    let user = state
        .store
        .get_user(session.user_id)
        .await
        .map_err(|_| ApiError::Unauthorized("account no longer exists".into()))?;
    if user.role.to_string() != session.role {
        state.store.delete_session(&token).await;
        return Err(ApiError::Unauthorized("role changed; log in again".into()));
    }
    req.extensions_mut().insert(RequestContext {
        user_id: user.id,
        role: user.role,
    });
    Ok(next.run(req).await)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// `POST /auth/login`. Demo-grade: a username is all it takes.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Envelope<LoginResponse>>, ApiError> {
    let username = body.username.trim();
    if username.is_empty() {
        return Err(ApiError::validation("username", "username is required"));
    }
    let user = state
        .store
        .user_by_username(username)
        .await
        .ok_or_else(|| ApiError::Unauthorized("unknown username".into()))?;
    let session = Session::new(user.id, user.role);
    let token = session.token.clone();
    state.store.insert_session(session).await;
    tracing::info!("user '{}' logged in as {}", user.username, user.role);
    Ok(Json(Envelope::data(LoginResponse { token, user })))
}

/// `DELETE /auth/logout`. Dropping an already-gone token is fine.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Envelope<serde_json::Value>> {
    if let Some(token) = bearer_token(&headers) {
        state.store.delete_session(token).await;
    }
    Json(Envelope::data(serde_json::json!({ "logged_out": true })))
}
