use super::{UploadBackend, UploadFile};
use crate::error::AppError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Files under `<dir>/<firma_id>/`, served by the router at `<url_prefix>/<firma_id>/<name>`.
#[derive(Clone, Debug)]
pub struct LocalBackend {
    dir: PathBuf,
    url_prefix: String,
}

impl LocalBackend {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into();
        LocalBackend {
            dir: dir.into(),
            url_prefix: format!("/{}", url_prefix.trim_matches('/')),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Maps an URL we issued back to its file. `None` for foreign URLs and anything escaping `dir`.
    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let rel = url.strip_prefix(&self.url_prefix)?.strip_prefix('/')?;
        let rel = Path::new(rel);
        if rel.components().all(|c| matches!(c, Component::Normal(_))) {
            Some(self.dir.join(rel))
        } else {
            None
        }
    }

    /// Like `path_for`, but only for files inside `<dir>/<firma_id>/`.
    fn owned_path(&self, firma_id: i64, url: &str) -> Option<PathBuf> {
        let path = self.path_for(url)?;
        let folder = self.dir.join(firma_id.to_string());
        (path.parent() == Some(folder.as_path())).then_some(path)
    }
}

#[async_trait]
impl UploadBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn store(&self, firma_id: i64, file: &UploadFile) -> Result<String, AppError> {
        let folder = self.dir.join(firma_id.to_string());
        tokio::fs::create_dir_all(&folder).await?;
        let name = file.object_name();
        tokio::fs::write(folder.join(&name), &file.bytes).await?;
        tracing::debug!(firma_id, file = %name, bytes = file.bytes.len(), "stored upload");
        Ok(format!("{}/{}/{}", self.url_prefix, firma_id, name))
    }

    async fn remove(&self, firma_id: i64, url: &str) -> Result<(), AppError> {
        let Some(path) = self.owned_path(firma_id, url) else {
            tracing::debug!(firma_id, url, "not an upload of this company, skipping");
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploads::UploadField;
    use axum::body::Bytes;

    #[tokio::test]
    async fn store_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path(), "uploads/");
        let file = UploadFile {
            field: UploadField::FirmaLogo,
            content_type: "image/png".into(),
            file_name: Some("logo.png".into()),
            bytes: Bytes::from_static(b"\x89PNG"),
        };
        let url = backend.store(12, &file).await.unwrap();
        assert!(url.starts_with("/uploads/12/firma_logo-"));
        assert!(url.ends_with(".png"));
        let path = backend.path_for(&url).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");

        backend.remove(12, &url).await.unwrap();
        assert!(!path.exists());
        // second removal is a no-op
        backend.remove(12, &url).await.unwrap();
    }

    #[tokio::test]
    async fn remove_leaves_other_companies_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path(), "/uploads");
        let file = UploadFile {
            field: UploadField::FirmaLogo,
            content_type: "image/png".into(),
            file_name: None,
            bytes: Bytes::from_static(b"logo"),
        };
        let url = backend.store(1, &file).await.unwrap();
        let path = backend.path_for(&url).unwrap();

        backend.remove(2, &url).await.unwrap();
        assert!(path.exists());
        assert!(backend.owned_path(2, &url).is_none());
        assert!(backend.owned_path(1, "/uploads/1/nested/a.png").is_none());

        backend.remove(1, &url).await.unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn foreign_and_traversal_urls_are_ignored() {
        let backend = LocalBackend::new("/srv/up", "/uploads");
        assert!(backend.path_for("https://cdn.test/a.png").is_none());
        assert!(backend.path_for("/uploads/../etc/passwd").is_none());
        assert_eq!(backend.path_for("/uploads/1/a.png"), Some(PathBuf::from("/srv/up/1/a.png")));
    }
}
