use super::{UploadBackend, UploadFile};
use crate::config::S3Settings;
use crate::error::AppError;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

/// Objects in an S3 bucket, publicly served from `public_base_url`.
#[derive(Clone, Debug)]
pub struct S3Backend {
    client: Client,
    settings: S3Settings,
}

impl S3Backend {
    pub fn new(client: Client, settings: S3Settings) -> Self {
        S3Backend { client, settings }
    }

    /// Credentials and region from the standard AWS provider chain.
    pub async fn from_env(settings: S3Settings) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), settings)
    }

    fn folder(&self, firma_id: i64) -> String {
        let prefix = self.settings.key_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/", firma_id)
        } else {
            format!("{}/{}/", prefix, firma_id)
        }
    }

    fn key(&self, firma_id: i64, file: &UploadFile) -> String {
        format!("{}{}", self.folder(firma_id), file.object_name())
    }

    /// Object key for an URL stored for `firma_id`; `None` for foreign URLs and other companies.
    fn owned_key<'a>(&self, firma_id: i64, url: &'a str) -> Option<&'a str> {
        let key = url
            .strip_prefix(self.settings.public_base_url.trim_end_matches('/'))?
            .strip_prefix('/')?;
        let name = key.strip_prefix(self.folder(firma_id).as_str())?;
        (!name.is_empty() && !name.contains('/')).then_some(key)
    }
}

#[async_trait]
impl UploadBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn store(&self, firma_id: i64, file: &UploadFile) -> Result<String, AppError> {
        let key = self.key(firma_id, file);
        self.client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(&key)
            .content_type(&file.content_type)
            .body(ByteStream::from(file.bytes.to_vec()))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("s3 put {}: {}", key, e)))?;
        tracing::debug!(firma_id, key = %key, "stored upload on s3");
        Ok(format!("{}/{}", self.settings.public_base_url, key))
    }

    async fn remove(&self, firma_id: i64, url: &str) -> Result<(), AppError> {
        let Some(key) = self.owned_key(firma_id, url) else {
            return Ok(());
        };
        self.client
            .delete_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("s3 delete {}: {}", key, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> S3Backend {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("eu-central-1"))
            .build();
        S3Backend::new(
            Client::from_conf(config),
            S3Settings {
                bucket: "cards".into(),
                public_base_url: "https://cdn.kartvizit.test".into(),
                key_prefix: "uploads".into(),
            },
        )
    }

    #[test]
    fn only_keys_in_the_company_folder_are_owned() {
        let b = backend();
        assert_eq!(
            b.owned_key(4, "https://cdn.kartvizit.test/uploads/4/firma_logo-x.png"),
            Some("uploads/4/firma_logo-x.png")
        );
        assert_eq!(b.owned_key(5, "https://cdn.kartvizit.test/uploads/4/firma_logo-x.png"), None);
        assert_eq!(b.owned_key(4, "https://cdn.kartvizit.test/uploads/44/firma_logo-x.png"), None);
        assert_eq!(b.owned_key(4, "https://other.test/uploads/4/a.png"), None);
    }
}
