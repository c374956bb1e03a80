//! JSON file key-value store for small settings: `<root>/<namespace>/<key>.json`.

use crate::error::AppError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Clone, Debug)]
pub struct SettingsStore {
    root: PathBuf,
}

/// Namespaces and keys become path segments, so only `[A-Za-z0-9_-]` is accepted.
fn check_segment(kind: &str, s: &str) -> Result<(), AppError> {
    let ok = !s.is_empty()
        && s.len() <= 128
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(AppError::field(kind, "may only contain letters, digits, '_' and '-'"))
    }
}

impl SettingsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SettingsStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, namespace: &str, key: &str) -> Result<PathBuf, AppError> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        Ok(self.root.join(namespace).join(format!("{}.json", key)))
    }

    pub async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, AppError> {
        let path = self.path(namespace, key)?;
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::Internal(format!("corrupt settings file {}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a sibling temp file, then renames over the target.
    pub async fn put(&self, namespace: &str, key: &str, value: &Value) -> Result<(), AppError> {
        let path = self.path(namespace, key)?;
        let dir = self.root.join(namespace);
        fs::create_dir_all(&dir).await?;
        let tmp = dir.join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| AppError::Internal(e.to_string()))?;
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(namespace, key, "settings written");
        Ok(())
    }

    /// Returns false when the key did not exist.
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<bool, AppError> {
        let path = self.path(namespace, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Sorted keys in a namespace; empty when the namespace has never been written.
    pub async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, AppError> {
        check_segment("namespace", namespace)?;
        let dir = self.root.join(namespace);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path());
        assert_eq!(store.get("icon-order", "7").await.unwrap(), None);
        store.put("icon-order", "7", &json!(["telefon", "email"])).await.unwrap();
        store.put("icon-order", "default", &json!([])).await.unwrap();
        assert_eq!(store.get("icon-order", "7").await.unwrap(), Some(json!(["telefon", "email"])));
        assert_eq!(store.list_keys("icon-order").await.unwrap(), vec!["7", "default"]);
        assert!(store.delete("icon-order", "7").await.unwrap());
        assert!(!store.delete("icon-order", "7").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path());
        assert!(store.get("icon-order", "../etc").await.is_err());
        assert!(store.put("a/b", "k", &json!(1)).await.is_err());
        assert!(store.list_keys("never-written").await.unwrap().is_empty());
    }
}
