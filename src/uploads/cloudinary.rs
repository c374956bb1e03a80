use super::{UploadBackend, UploadFile};
use crate::config::CloudinarySettings;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Signed uploads to the Cloudinary REST API.
#[derive(Clone)]
pub struct CloudinaryBackend {
    settings: CloudinarySettings,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// `sha256("k1=v1&k2=v2...<secret>")` over the parameters sorted by name.
fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{}{}", joined, secret).as_bytes()))
}

impl CloudinaryBackend {
    pub fn new(settings: CloudinarySettings, http: reqwest::Client) -> Self {
        CloudinaryBackend { settings, http }
    }

    fn endpoint(&self, file: &UploadFile) -> String {
        let resource = if file.field.is_image() { "image" } else { "raw" };
        format!(
            "https://api.cloudinary.com/v1_1/{}/{}/upload",
            self.settings.cloud_name, resource
        )
    }
}

#[async_trait]
impl UploadBackend for CloudinaryBackend {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn store(&self, firma_id: i64, file: &UploadFile) -> Result<String, AppError> {
        let object = file.object_name();
        let public_id = object.rsplit_once('.').map(|(stem, _)| stem.to_string()).unwrap_or(object.clone());
        let signed = vec![
            ("folder", format!("kartvizit/{}", firma_id)),
            ("public_id", public_id),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];
        let signature = sign(&signed, &self.settings.api_secret);

        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone().unwrap_or(object))
            .mime_str(&file.content_type)
            .map_err(|e| AppError::Internal(format!("cloudinary part: {}", e)))?;
        let mut form = Form::new()
            .part("file", part)
            .text("api_key", self.settings.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (k, v) in signed {
            form = form.text(k, v);
        }

        let resp = self
            .http
            .post(self.endpoint(file))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("cloudinary request: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("cloudinary returned {}: {}", status, body)));
        }
        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("cloudinary response: {}", e)))?;
        tracing::debug!(firma_id, url = %body.secure_url, "stored upload on cloudinary");
        Ok(body.secure_url)
    }

    async fn remove(&self, _firma_id: i64, url: &str) -> Result<(), AppError> {
        // CDN assets are left in place; they are unreachable once the company row is gone
        tracing::debug!(url, "cloudinary asset kept");
        Ok(())
    }
}
