//! Package inquiry form: validated, rendered to HTML and mailed to the admin address.

use crate::config::ContentKind;
use crate::error::{AppError, ValidationErrors};
use crate::mail::OutgoingMail;
use crate::response::ok_message;
use crate::service::is_email;
use crate::state::AppState;
use crate::templates::InquiryEmail;
use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InquiryBody {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub package_id: Option<Value>,
    pub message: Option<String>,
}

fn clean(v: &Option<String>) -> Option<String> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

impl InquiryBody {
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "is required");
        } else if name.chars().count() > 120 {
            errors.add("name", "must be at most 120 characters");
        }
        let email = self.email.trim();
        if email.is_empty() {
            errors.add("email", "is required");
        } else if !is_email(email) {
            errors.add("email", "must be a valid email");
        }
        if clean(&self.phone).is_some_and(|p| p.chars().count() > 40) {
            errors.add("phone", "must be at most 40 characters");
        }
        if clean(&self.message).is_some_and(|m| m.chars().count() > 5000) {
            errors.add("message", "must be at most 5000 characters");
        }
        if self.package_id.as_ref().is_some_and(|v| !v.is_null() && package_id(v).is_none()) {
            errors.add("package_id", "must be an integer");
        }
        errors
    }
}

fn package_id(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// POST /api/packages/inquiry
pub async fn submit(State(state): State<AppState>, Json(body): Json<InquiryBody>) -> Result<impl IntoResponse, AppError> {
    body.validate().into_result()?;
    let to = state
        .settings
        .admin_email
        .clone()
        .ok_or_else(|| AppError::Mail("ADMIN_EMAIL is not configured".into()))?;

    let package_name = match body.package_id.as_ref().and_then(package_id) {
        Some(id) => state
            .repo
            .get_content(ContentKind::Packages, id)
            .await?
            .and_then(|p| p.get("name").and_then(Value::as_str).map(String::from)),
        None => None,
    };

    let mail = InquiryEmail {
        name: body.name.trim().to_string(),
        email: body.email.trim().to_string(),
        phone: clean(&body.phone),
        company: clean(&body.company),
        package_name,
        message: clean(&body.message),
        sent_at: chrono::Utc::now().format("%d.%m.%Y %H:%M UTC").to_string(),
    };
    let html = state.templates.render_inquiry_email(&mail)?;
    let subject = match &mail.package_name {
        Some(p) => format!("Paket talebi: {} ({})", p, mail.name),
        None => format!("Paket talebi: {}", mail.name),
    };
    state
        .mailer
        .send(OutgoingMail {
            to,
            reply_to: Some(mail.email.clone()),
            subject,
            html,
        })
        .await?;
    tracing::info!(package = ?mail.package_name, "package inquiry forwarded");
    Ok(ok_message("Inquiry received"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requires_name_and_valid_email() {
        let body: InquiryBody = serde_json::from_value(json!({ "email": "nope", "package_id": "x" })).unwrap();
        let errors = body.validate();
        assert_eq!(errors.get("name"), Some("is required"));
        assert_eq!(errors.get("email"), Some("must be a valid email"));
        assert_eq!(errors.get("package_id"), Some("must be an integer"));

        let ok: InquiryBody =
            serde_json::from_value(json!({ "name": "Ali", "email": "ali@acme.com.tr", "package_id": 3 })).unwrap();
        assert!(ok.validate().is_empty());
    }
}
