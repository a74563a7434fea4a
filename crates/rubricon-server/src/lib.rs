//! rubricon-server — the JSON API.
//!
//! Every endpoint except `/health`, `/auth/login` and the raw CSV/HTML
//! exports speaks the `{success, data, meta, errors}` envelope. Session
//! middleware resolves the bearer token once per request; handlers check
//! capabilities against the resolved role.

pub mod auth;
pub mod context;
pub mod envelope;
pub mod error;
pub mod pagination;
pub mod routes;
pub mod sort;
pub mod state;

use anyhow::Context;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use error::ApiError;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let open = Router::new()
        .route("/health", get(routes::health::health))
        .route("/auth/login", post(auth::login));

    let protected = Router::new()
        .route("/auth/logout", delete(auth::logout))
        .route("/forms", get(routes::forms::list))
        .route("/forms/{id}", get(routes::forms::get))
        .route("/sub-indicators", get(routes::sub_indicators::list))
        .route("/stimuli", get(routes::stimuli::list))
        .route("/stimuli/{id}", get(routes::stimuli::get))
        .route(
            "/items",
            get(routes::items::list).post(routes::items::create),
        )
        .route(
            "/items/{id}",
            get(routes::items::get).put(routes::items::update),
        )
        .route("/items/{id}/activate", post(routes::items::activate))
        .route("/items/{id}/retire", post(routes::items::retire))
        .route(
            "/items/{id}/rubric",
            get(routes::items::get_rubric).put(routes::items::put_rubric),
        )
        .route(
            "/attempts",
            get(routes::attempts::list).post(routes::attempts::create),
        )
        .route("/attempts/{id}", get(routes::attempts::get))
        .route("/attempts/{id}/submit", post(routes::attempts::submit))
        .route(
            "/attempts/{id}/responses",
            get(routes::attempts::list_responses),
        )
        .route(
            "/attempts/{id}/responses/{item_id}",
            put(routes::attempts::upsert_response),
        )
        .route(
            "/responses/{id}/rubric-scores",
            post(routes::attempts::record_rubric_score),
        )
        .route("/attempts/{id}/summary", get(routes::attempts::summary))
        .route("/attempts/{id}/score", post(routes::attempts::score))
        .route(
            "/attempts/{id}/report",
            get(routes::reports::get).post(routes::reports::generate),
        )
        .route(
            "/attempts/{id}/report/publish",
            post(routes::reports::publish),
        )
        .route(
            "/attempts/{id}/report/unpublish",
            post(routes::reports::unpublish),
        )
        .route(
            "/attempts/{id}/report/sections/{key}",
            post(routes::reports::regenerate_section),
        )
        .route("/attempts/{id}/report/export", get(routes::reports::export))
        .route("/import/items", post(routes::imports::upload))
        .route("/import/batches/{id}", get(routes::imports::get_batch))
        .route("/export/items/template", get(routes::imports::template))
        .route("/export/items", get(routes::imports::export_items))
        .route("/jobs/{id}", get(routes::jobs::get))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    open.merge(protected)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Binds and serves until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
