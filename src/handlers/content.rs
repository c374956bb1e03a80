//! Homepage content under `/api/settings/<kind>` plus the per-company icon order.

use crate::config::ContentKind;
use crate::error::AppError;
use crate::extractors::{AdminSession, MaybeSession};
use crate::response::{created, ok, ok_many, ok_message, ok_with_message};
use crate::service::pages::parse_icon_order;
use crate::service::{ContentService, ICON_ORDER_NAMESPACE};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

fn kind_for(segment: &str) -> Result<ContentKind, AppError> {
    ContentKind::from_path(segment).ok_or_else(|| AppError::NotFound(format!("settings kind {}", segment)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub all: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderBody {
    pub ids: Vec<i64>,
}

/// GET /api/settings/:kind. `?all=true` includes inactive rows for a signed-in admin.
pub async fn list(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let kind = kind_for(&segment)?;
    let wants_all = matches!(q.all.as_deref(), Some("true") | Some("1"));
    if wants_all && session.is_none() {
        return Err(AppError::Unauthorized);
    }
    let rows = ContentService::list(&state, kind, wants_all).await?;
    Ok(ok_many(rows))
}

/// POST /api/settings/:kind
pub async fn create(
    AdminSession(_): AdminSession,
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let kind = kind_for(&segment)?;
    let row = ContentService::create(&state, kind, body).await?;
    Ok(created(row, &format!("{} created", kind.entity().label)))
}

/// PUT /api/settings/:kind with `id` in the body.
pub async fn update(
    AdminSession(_): AdminSession,
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let kind = kind_for(&segment)?;
    let row = ContentService::update(&state, kind, body).await?;
    Ok(ok_with_message(row, &format!("{} updated", kind.entity().label)))
}

/// DELETE /api/settings/:kind?id=
pub async fn delete(
    AdminSession(_): AdminSession,
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(q): Query<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    let kind = kind_for(&segment)?;
    let id = q
        .id
        .as_deref()
        .ok_or_else(|| AppError::field("id", "is required"))?
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::field("id", "must be an integer"))?;
    let row = ContentService::delete(&state, kind, id).await?;
    Ok(ok_with_message(row, &format!("{} deleted", kind.entity().label)))
}

/// PUT /api/settings/:kind/order `{ "ids": [...] }`
pub async fn reorder(
    AdminSession(_): AdminSession,
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Json(body): Json<OrderBody>,
) -> Result<impl IntoResponse, AppError> {
    let kind = kind_for(&segment)?;
    ContentService::reorder(&state, kind, &body.ids).await?;
    Ok(ok_message("Order saved"))
}

#[derive(Debug, Deserialize)]
pub struct FirmaQuery {
    pub firma_id: Option<i64>,
}

fn icon_key(q: &FirmaQuery) -> Result<String, AppError> {
    q.firma_id
        .map(|id| id.to_string())
        .ok_or_else(|| AppError::field("firma_id", "is required"))
}

/// GET /api/settings/icon-order?firma_id=
pub async fn get_icon_order(
    State(state): State<AppState>,
    Query(q): Query<FirmaQuery>,
) -> Result<impl IntoResponse, AppError> {
    let key = icon_key(&q)?;
    let order = match state.store.get(ICON_ORDER_NAMESPACE, &key).await? {
        Some(v) => parse_icon_order(&v),
        None => Vec::new(),
    };
    Ok(ok(json!({ "firma_id": q.firma_id, "order": order })))
}

#[derive(Debug, Deserialize)]
pub struct IconOrderBody {
    pub order: Value,
}

/// PUT /api/settings/icon-order?firma_id= `{ "order": ["whatsapp", "telefon"] }`
pub async fn put_icon_order(
    AdminSession(_): AdminSession,
    State(state): State<AppState>,
    Query(q): Query<FirmaQuery>,
    Json(body): Json<IconOrderBody>,
) -> Result<impl IntoResponse, AppError> {
    let key = icon_key(&q)?;
    if !body.order.is_array() {
        return Err(AppError::field("order", "must be an array of contact types"));
    }
    let order = parse_icon_order(&body.order);
    state.store.put(ICON_ORDER_NAMESPACE, &key, &json!(order)).await?;
    // the card page embeds the order, so the cached snapshot is stale
    if let Some(id) = q.firma_id {
        if let Some(company) = state.repo.get_company(id).await? {
            state.cache.invalidate_slug(company.slug()).await;
        }
    }
    Ok(ok_with_message(json!({ "firma_id": q.firma_id, "order": order }), "Icon order saved"))
}
