//! Company CRUD handlers: list, read, create, update, delete, file upload.

use crate::error::AppError;
use crate::extractors::AdminSession;
use crate::models::CompanyQuery;
use crate::response::{created, ok, ok_many, ok_with_message};
use crate::service::CompanyService;
use crate::state::AppState;
use crate::uploads::{UploadField, UploadFile};
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id: {}", raw)))
}

/// GET /api/companies?search=&limit=&offset=
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<CompanyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = CompanyService::list(&state, &query).await?;
    Ok(ok_many(rows))
}

/// GET /api/companies/:id
pub async fn read(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let company = CompanyService::get(&state, parse_id(&id)?).await?;
    Ok(ok(company))
}

/// POST /api/companies
pub async fn create(
    AdminSession(_): AdminSession,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let company = CompanyService::create(&state, body).await?;
    Ok(created(company, "Company created"))
}

/// PUT /api/companies/:id
pub async fn update(
    AdminSession(_): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let company = CompanyService::update(&state, parse_id(&id)?, body).await?;
    Ok(ok_with_message(company, "Company updated"))
}

/// DELETE /api/companies/:id
pub async fn delete(
    AdminSession(_): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let company = CompanyService::delete(&state, parse_id(&id)?).await?;
    Ok(ok_with_message(json!({ "id": company.id(), "slug": company.slug() }), "Company deleted"))
}

/// DELETE /api/companies?id=
pub async fn delete_by_query(
    session: AdminSession,
    state: State<AppState>,
    Query(q): Query<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    let id = q.id.ok_or_else(|| AppError::field("id", "is required"))?;
    delete(session, state, Path(id)).await
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("upload exceeds the request size limit".into())
    } else {
        AppError::BadRequest(format!("invalid multipart body: {}", e.body_text()))
    }
}

/// Known file fields from the form; other fields are skipped.
pub async fn read_upload_fields(mut multipart: Multipart) -> Result<Vec<UploadFile>, AppError> {
    let mut files = Vec::new();
    while let Some(part) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(field) = part.name().and_then(UploadField::from_name) else {
            continue;
        };
        let content_type = part
            .content_type()
            .map(|c| c.split(';').next().unwrap_or(c).trim().to_ascii_lowercase())
            .unwrap_or_default();
        let file_name = part.file_name().map(String::from);
        let bytes = part.bytes().await.map_err(multipart_error)?;
        files.retain(|f: &UploadFile| f.field != field);
        files.push(UploadFile {
            field,
            content_type,
            file_name,
            bytes,
        });
    }
    Ok(files)
}

/// POST /api/companies/:id/files (multipart: profil_foto, firma_logo, katalog)
pub async fn upload_files(
    AdminSession(_): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let files = read_upload_fields(multipart).await?;
    let (company, urls) = CompanyService::attach_files(&state, id, files).await?;
    let uploaded: serde_json::Map<String, Value> = urls
        .into_iter()
        .map(|(field, url)| (field.name().to_string(), Value::String(url)))
        .collect();
    Ok(ok_with_message(
        json!({ "company": company, "uploaded": uploaded }),
        "Files uploaded",
    ))
}
