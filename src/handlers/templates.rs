//! Template catalog and admin previews.

use crate::error::AppError;
use crate::response::ok_many;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse},
};

/// GET /api/templates
pub async fn list(State(state): State<AppState>) -> impl IntoResponse {
    ok_many(state.templates.list().to_vec())
}

/// GET /api/templates/:id/preview
pub async fn preview(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let id: i32 = id
        .trim()
        .parse()
        .map_err(|_| AppError::NotFound(format!("template {}", id)))?;
    let html = state.templates.render_preview(id, &state.settings.public_base_url)?;
    Ok(Html(html))
}
