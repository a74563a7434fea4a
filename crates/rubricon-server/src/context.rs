//! Per-request identity, injected by the session middleware.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rubricon_core::roles::{Capability, Role};
use uuid::Uuid;

use crate::error::ApiError;

/// Who is making the request. The session middleware resolves the
/// bearer token and stashes one of these in the request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl RequestContext {
    /// Fails with 403 unless the caller's role grants `capability`.
    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "missing capability: {capability:?}"
            )))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("login required".into()))
    }
}
