//! Router assembly: common routes, `/api`, uploaded files, and the public `/:slug` page.

mod api;
mod common;

pub use api::{api_routes, ApiDoc};
pub use common::common_routes;

use crate::config::UploadBackendKind;
use crate::error::AppError;
use crate::handlers::public;
use crate::monitoring::track_requests;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

/// Largest accepted request body: one catalog PDF plus both images with multipart overhead.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

async fn not_found() -> AppError {
    AppError::NotFound("route".into())
}

pub fn app_router(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(common_routes())
        .nest("/api", api_routes())
        .route("/:slug", get(public::card));

    if state.settings.uploads.backend == UploadBackendKind::Local {
        let prefix = format!("/{}", state.settings.uploads.url_prefix.trim_matches('/'));
        if prefix != "/" {
            router = router.nest_service(&prefix, ServeDir::new(&state.settings.uploads.dir));
        }
    }

    router
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.metrics.clone(), track_requests))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
