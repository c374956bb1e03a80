//! Company file uploads (photo, logo, catalog) behind a pluggable storage backend.

mod cloudinary;
mod local;
mod s3;

pub use cloudinary::CloudinaryBackend;
pub use local::LocalBackend;
pub use s3::S3Backend;

use crate::config::{UploadBackendKind, UploadSettings};
use crate::error::{AppError, ConfigError, ValidationErrors};
use async_trait::async_trait;
use axum::body::Bytes;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;

const MIB: usize = 1024 * 1024;

pub const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif", "image/svg+xml"];

/// The company columns that hold uploaded file URLs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UploadField {
    ProfilFoto,
    FirmaLogo,
    Katalog,
}

impl UploadField {
    pub const ALL: [UploadField; 3] = [UploadField::ProfilFoto, UploadField::FirmaLogo, UploadField::Katalog];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            UploadField::ProfilFoto => "profil_foto",
            UploadField::FirmaLogo => "firma_logo",
            UploadField::Katalog => "katalog",
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            UploadField::Katalog => 20 * MIB,
            _ => 5 * MIB,
        }
    }

    pub fn accepts(&self, content_type: &str) -> bool {
        match self {
            UploadField::Katalog => content_type == "application/pdf",
            _ => IMAGE_TYPES.contains(&content_type),
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, UploadField::Katalog)
    }
}

/// File extension for an accepted content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

#[derive(Clone, Debug)]
pub struct UploadFile {
    pub field: UploadField,
    pub content_type: String,
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl UploadFile {
    /// Object name: `<field>-<uuid>.<ext>`.
    pub fn object_name(&self) -> String {
        format!(
            "{}-{}.{}",
            self.field.name(),
            uuid::Uuid::new_v4().simple(),
            extension_for(&self.content_type)
        )
    }
}

#[async_trait]
pub trait UploadBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stores the file and returns its public URL.
    async fn store(&self, firma_id: i64, file: &UploadFile) -> Result<String, AppError>;

    /// Deletes a file previously stored for `firma_id`. URLs the backend does not own, and files
    /// stored for another company, are left alone.
    async fn remove(&self, firma_id: i64, url: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct UploadService {
    backend: Arc<dyn UploadBackend>,
}

impl std::fmt::Debug for UploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadService").field("backend", &self.backend.name()).finish()
    }
}

impl UploadService {
    pub fn new(backend: Arc<dyn UploadBackend>) -> Self {
        UploadService { backend }
    }

    pub async fn from_settings(settings: &UploadSettings, http: reqwest::Client) -> Result<Self, AppError> {
        let backend: Arc<dyn UploadBackend> = match settings.backend {
            UploadBackendKind::Local => Arc::new(LocalBackend::new(settings.dir.clone(), settings.url_prefix.clone())),
            UploadBackendKind::Cloudinary => {
                let c = settings
                    .cloudinary
                    .clone()
                    .ok_or(ConfigError::Missing("CLOUDINARY_CLOUD_NAME"))?;
                Arc::new(CloudinaryBackend::new(c, http))
            }
            UploadBackendKind::S3 => {
                let s = settings.s3.clone().ok_or(ConfigError::Missing("S3_BUCKET"))?;
                Arc::new(S3Backend::from_env(s).await)
            }
        };
        tracing::info!(backend = backend.name(), "upload backend ready");
        Ok(UploadService { backend })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Type, size and emptiness checks for every file, all reported at once.
    pub fn check(files: &[UploadFile]) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        for f in files {
            let field = f.field.name();
            if f.bytes.is_empty() {
                errors.add(field, "file is empty");
            } else if !f.field.accepts(&f.content_type) {
                errors.add(
                    field,
                    if f.field.is_image() {
                        "must be a png, jpeg, webp, gif or svg image"
                    } else {
                        "must be a PDF document"
                    },
                );
            } else if f.bytes.len() > f.field.max_bytes() {
                errors.add(field, format!("must be at most {} MiB", f.field.max_bytes() / MIB));
            }
        }
        errors.into_result()
    }

    /// Uploads every file concurrently. Fails with one message naming every failed field.
    pub async fn upload_all(&self, firma_id: i64, files: &[UploadFile]) -> Result<BTreeMap<UploadField, String>, AppError> {
        Self::check(files)?;
        let results = join_all(files.iter().map(|f| async move {
            let result = self.backend.store(firma_id, f).await;
            (f.field, result)
        }))
        .await;

        let mut urls = BTreeMap::new();
        let mut failed = Vec::new();
        for (field, result) in results {
            match result {
                Ok(url) => {
                    urls.insert(field, url);
                }
                Err(e) => {
                    tracing::error!(firma_id, field = field.name(), error = %e, "upload failed");
                    failed.push(field.name());
                }
            }
        }
        if !failed.is_empty() {
            // stored siblings would be orphaned; drop them before reporting
            for url in urls.values() {
                if let Err(e) = self.backend.remove(firma_id, url).await {
                    tracing::warn!(url = %url, error = %e, "could not remove partial upload");
                }
            }
            return Err(AppError::Upload(failed.join(", ")));
        }
        Ok(urls)
    }

    /// Removes every URL owned by `firma_id`, returning the ones that could not be deleted.
    pub async fn remove_all(&self, firma_id: i64, urls: &[String]) -> Vec<(String, AppError)> {
        let results = join_all(
            urls.iter()
                .map(|u| async move { (u.clone(), self.backend.remove(firma_id, u).await) }),
        )
        .await;
        results
            .into_iter()
            .filter_map(|(u, r)| r.err().map(|e| (u, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn file(field: UploadField, content_type: &str, len: usize) -> UploadFile {
        UploadFile {
            field,
            content_type: content_type.into(),
            file_name: None,
            bytes: Bytes::from(vec![1u8; len]),
        }
    }

    struct FlakyBackend {
        fail_field: UploadField,
        removed: AtomicUsize,
    }

    #[async_trait]
    impl UploadBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn store(&self, firma_id: i64, file: &UploadFile) -> Result<String, AppError> {
            if file.field == self.fail_field {
                return Err(AppError::Internal("storage down".into()));
            }
            Ok(format!("/uploads/{}/{}", firma_id, file.object_name()))
        }

        async fn remove(&self, _firma_id: i64, _url: &str) -> Result<(), AppError> {
            self.removed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn check_reports_every_bad_field() {
        let err = UploadService::check(&[
            file(UploadField::ProfilFoto, "image/png", 0),
            file(UploadField::FirmaLogo, "text/html", 10),
            file(UploadField::Katalog, "application/pdf", 21 * MIB),
        ])
        .unwrap_err();
        match err {
            AppError::Validation(v) => {
                assert_eq!(v.get("profil_foto"), Some("file is empty"));
                assert!(v.get("firma_logo").is_some());
                assert_eq!(v.get("katalog"), Some("must be at most 20 MiB"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_field_is_named_and_siblings_are_removed() {
        let backend = Arc::new(FlakyBackend {
            fail_field: UploadField::Katalog,
            removed: AtomicUsize::new(0),
        });
        let service = UploadService::new(backend.clone());
        let err = service
            .upload_all(
                3,
                &[
                    file(UploadField::FirmaLogo, "image/png", 4),
                    file(UploadField::Katalog, "application/pdf", 4),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "upload failed: katalog");
        assert_eq!(backend.removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fields_parse_by_column_name() {
        assert_eq!(UploadField::from_name("firma_logo"), Some(UploadField::FirmaLogo));
        assert_eq!(UploadField::from_name("avatar"), None);
        assert_eq!(extension_for("image/jpeg"), "jpg");
    }
}
