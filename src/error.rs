//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use utoipa::ToSchema;

/// Message returned to callers for every 500-class error. The real cause is logged only.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Fixed message for requests without a valid admin session.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// Field-level validation failures, keyed by field path (e.g. `communication[0].deger`).
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the first message per field; later messages for the same field are dropped.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for (k, v) in other.fields {
            self.add(format!("{}.{}", prefix, k), v);
        }
    }

    /// `Ok(())` when empty, otherwise `AppError::Validation(self)`.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("template: {0}")]
    Template(String),
    #[error("mail: {0}")]
    Mail(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    /// Single-field validation error.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Config(_)
            | AppError::Db(_)
            | AppError::Upload(_)
            | AppError::Template(_)
            | AppError::Mail(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation_error",
            AppError::Db(sqlx::Error::RowNotFound) => "not_found",
            AppError::Db(_) => "database_error",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized => "unauthorized",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::Upload(_) => "upload_error",
            AppError::Template(_) => "template_error",
            AppError::Mail(_) => "mail_error",
            AppError::Io(_) => "io_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

/// Postgres SQLSTATE 23505 (unique_violation) becomes a conflict; everything else stays a DB error.
pub fn map_unique_violation(err: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return AppError::Conflict(format!("{} already exists", what));
        }
    }
    AppError::Db(err)
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    /// Field path to message, present on validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, details) = match &self {
            AppError::Validation(errors) => (
                "Validation failed".to_string(),
                serde_json::to_value(errors.fields()).ok(),
            ),
            AppError::Unauthorized => (UNAUTHORIZED_MESSAGE.to_string(), None),
            AppError::NotFound(what) => (format!("Not found: {}", what), None),
            AppError::Conflict(msg) | AppError::BadRequest(msg) | AppError::PayloadTooLarge(msg) => {
                (msg.clone(), None)
            }
            // carries only field names; backend causes are logged where they occur
            AppError::Upload(fields) => (format!("Upload failed for: {}", fields), None),
            _ if status.is_server_error() => {
                tracing::error!(error = %self, code, "request failed");
                (GENERIC_ERROR_MESSAGE.to_string(), None)
            }
            _ => (self.to_string(), None),
        };
        let body = ErrorBody {
            success: false,
            error: code.to_string(),
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_keeps_first_message_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("slug", "is required");
        errors.add("slug", "is too long");
        assert_eq!(errors.get("slug"), Some("is required"));
    }

    #[test]
    fn statuses_follow_error_class() {
        assert_eq!(AppError::field("x", "bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Conflict("slug".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::Db(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let resp = AppError::Internal("secret pool url".into()).into_response();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("secret pool url"));
        assert!(text.contains(GENERIC_ERROR_MESSAGE));
    }
}
