//! Public card endpoints: page by slug (HTML or JSON), QR page, vCard download.

use crate::cache::PUBLIC_CACHE_CONTROL;
use crate::error::AppError;
use crate::models::Company;
use crate::state::AppState;
use crate::templates::build_vcard;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// `Accept` asks for JSON and does not also accept HTML (browsers send both).
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    accept.contains("application/json") && !accept.contains("text/html")
}

fn with_public_cache(mut resp: Response) -> Response {
    resp.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(PUBLIC_CACHE_CONTROL));
    resp
}

async fn find_company(state: &AppState, slug: &str) -> Result<Company, AppError> {
    state
        .repo
        .get_company_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("company {}", slug)))
}

async fn projection(state: &AppState, slug: &str) -> Result<Arc<Value>, AppError> {
    if let Some(hit) = state.cache.get_json(slug).await {
        return Ok(hit);
    }
    let epoch = state.cache.epoch();
    let company = find_company(state, slug).await?;
    let value = company.public_projection();
    state.cache.put_json_since(epoch, slug, value.clone()).await;
    Ok(Arc::new(value))
}

async fn page_html(state: &AppState, slug: &str) -> Result<Arc<String>, AppError> {
    if let Some(hit) = state.cache.get_html(slug).await {
        return Ok(hit);
    }
    let epoch = state.cache.epoch();
    let company = find_company(state, slug).await?;
    let html = state.renderer.render_card(&company).await?;
    state.cache.put_html_since(epoch, slug, html.clone()).await;
    Ok(Arc::new(html))
}

/// GET /:slug
pub async fn card(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let slug = slug.trim().to_lowercase();
    if wants_json(&headers) {
        let value = projection(&state, &slug).await?;
        return Ok(with_public_cache(Json(value.as_ref().clone()).into_response()));
    }
    let html = page_html(&state, &slug).await?;
    if let Err(e) = state.repo.increment_views(&slug).await {
        tracing::warn!(slug = %slug, error = %e, "view count not updated");
    }
    Ok(with_public_cache(Html(html.as_ref().clone()).into_response()))
}

/// GET /api/content/:slug
pub async fn content(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Response, AppError> {
    let value = projection(&state, &slug.trim().to_lowercase()).await?;
    Ok(with_public_cache(Json(value.as_ref().clone()).into_response()))
}

#[derive(Debug, Default, Deserialize)]
pub struct QrQuery {
    pub format: Option<String>,
}

/// GET /api/qr-codes/:slug, `?format=svg` for the bare image.
pub async fn qr_code(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(q): Query<QrQuery>,
) -> Result<Response, AppError> {
    let company = find_company(&state, &slug.trim().to_lowercase()).await?;
    if q.format.as_deref() == Some("svg") {
        let svg = state.renderer.qr_svg(&company)?;
        let resp = ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response();
        return Ok(with_public_cache(resp));
    }
    let html = state.renderer.render_qr_page(&company).await;
    Ok(with_public_cache(Html(html).into_response()))
}

/// GET /api/vcard/:slug
pub async fn vcard(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Response, AppError> {
    let company = find_company(&state, &slug.trim().to_lowercase()).await?;
    let body = build_vcard(&company, state.renderer.base_url());
    let disposition = format!("attachment; filename=\"{}.vcf\"", company.slug());
    let mut resp = ([(header::CONTENT_TYPE, "text/vcard; charset=utf-8")], body).into_response();
    if let Ok(v) = HeaderValue::from_str(&disposition) {
        resp.headers_mut().insert(header::CONTENT_DISPOSITION, v);
    }
    Ok(resp)
}
