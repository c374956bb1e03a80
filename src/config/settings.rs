//! Runtime settings from environment variables (a `.env` file is honoured by the server binary).

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where uploaded files end up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadBackendKind {
    /// Files under `upload_dir`, served at `upload_url_prefix`.
    Local,
    /// Cloudinary image CDN (signed REST upload).
    Cloudinary,
    /// S3-compatible bucket; credentials come from the standard AWS environment.
    S3,
}

impl FromStr for UploadBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(UploadBackendKind::Local),
            "cloudinary" => Ok(UploadBackendKind::Cloudinary),
            "s3" => Ok(UploadBackendKind::S3),
            _ => Err(ConfigError::Invalid {
                key: "UPLOAD_BACKEND",
                message: format!("{} (expected local, cloudinary or s3)", s),
            }),
        }
    }
}

/// Exponential backoff parameters for post-processing tasks.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    /// `None` selects the in-memory repository.
    pub url: Option<String>,
    pub schema: String,
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Clone, Debug, Default)]
pub struct S3Settings {
    pub bucket: String,
    /// Public base URL objects are served from (bucket website or CDN in front of it).
    pub public_base_url: String,
    pub key_prefix: String,
}

#[derive(Clone, Debug)]
pub struct UploadSettings {
    pub backend: UploadBackendKind,
    pub dir: PathBuf,
    pub url_prefix: String,
    pub cloudinary: Option<CloudinarySettings>,
    pub s3: Option<S3Settings>,
}

#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct AuthSettings {
    pub session_secret: String,
    pub session_ttl: Duration,
    pub admin_username: String,
    /// Argon2 PHC string.
    pub admin_password_hash: Option<String>,
    /// Plain password, hashed once at startup when no hash is configured.
    pub admin_password: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub public_base_url: String,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub uploads: UploadSettings,
    pub settings_dir: PathBuf,
    pub cache_ttl: Duration,
    pub cache_max_entries: u64,
    pub smtp: Option<SmtpSettings>,
    pub admin_email: Option<String>,
    pub alert_webhook_url: Option<String>,
    pub chatops_webhook_url: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: "0.0.0.0:3000".into(),
            public_base_url: "http://localhost:3000".into(),
            database: DatabaseSettings {
                url: None,
                schema: "kartvizit".into(),
                max_connections: 5,
                idle_timeout: Duration::from_secs(10),
                acquire_timeout: Duration::from_secs(5),
            },
            auth: AuthSettings {
                session_secret: random_secret(),
                session_ttl: Duration::from_secs(86_400),
                admin_username: "admin".into(),
                admin_password_hash: None,
                admin_password: None,
            },
            uploads: UploadSettings {
                backend: UploadBackendKind::Local,
                dir: PathBuf::from("public/uploads"),
                url_prefix: "/uploads".into(),
                cloudinary: None,
                s3: None,
            },
            settings_dir: PathBuf::from("data/settings"),
            cache_ttl: Duration::from_secs(300),
            cache_max_entries: 10_000,
            smtp: None,
            admin_email: None,
            alert_webhook_url: None,
            chatops_webhook_url: None,
            retry: RetryPolicy::default(),
        }
    }
}

fn random_secret() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut s = Settings::default();

        if let Some(v) = get("BIND_ADDR") {
            s.bind_addr = v;
        }
        if let Some(v) = get("PUBLIC_BASE_URL") {
            s.public_base_url = v.trim_end_matches('/').to_string();
        }

        s.database.url = get("DATABASE_URL");
        if let Some(v) = get("KARTVIZIT_SCHEMA") {
            if !is_identifier(&v) {
                return Err(ConfigError::Invalid {
                    key: "KARTVIZIT_SCHEMA",
                    message: format!("{} is not a valid identifier", v),
                });
            }
            s.database.schema = v;
        }
        s.database.max_connections = parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 5)?;
        s.database.idle_timeout = Duration::from_secs(parse_or("DB_IDLE_TIMEOUT_SECS", get("DB_IDLE_TIMEOUT_SECS"), 10)?);
        s.database.acquire_timeout =
            Duration::from_secs(parse_or("DB_ACQUIRE_TIMEOUT_SECS", get("DB_ACQUIRE_TIMEOUT_SECS"), 5)?);

        if let Some(v) = get("SESSION_SECRET") {
            s.auth.session_secret = v;
        }
        s.auth.session_ttl = Duration::from_secs(parse_or("SESSION_TTL_SECS", get("SESSION_TTL_SECS"), 86_400)?);
        if let Some(v) = get("ADMIN_USERNAME") {
            s.auth.admin_username = v;
        }
        s.auth.admin_password_hash = get("ADMIN_PASSWORD_HASH");
        s.auth.admin_password = get("ADMIN_PASSWORD");

        if let Some(v) = get("UPLOAD_BACKEND") {
            s.uploads.backend = v.parse()?;
        }
        if let Some(v) = get("UPLOAD_DIR") {
            s.uploads.dir = PathBuf::from(v);
        }
        if let Some(v) = get("UPLOAD_URL_PREFIX") {
            s.uploads.url_prefix = format!("/{}", v.trim_matches('/'));
        }
        if s.uploads.backend == UploadBackendKind::Cloudinary {
            s.uploads.cloudinary = Some(CloudinarySettings {
                cloud_name: get("CLOUDINARY_CLOUD_NAME").ok_or(ConfigError::Missing("CLOUDINARY_CLOUD_NAME"))?,
                api_key: get("CLOUDINARY_API_KEY").ok_or(ConfigError::Missing("CLOUDINARY_API_KEY"))?,
                api_secret: get("CLOUDINARY_API_SECRET").ok_or(ConfigError::Missing("CLOUDINARY_API_SECRET"))?,
            });
        }
        if s.uploads.backend == UploadBackendKind::S3 {
            let bucket = get("S3_BUCKET").ok_or(ConfigError::Missing("S3_BUCKET"))?;
            s.uploads.s3 = Some(S3Settings {
                public_base_url: get("S3_PUBLIC_BASE_URL")
                    .map(|v| v.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket)),
                key_prefix: get("S3_KEY_PREFIX").unwrap_or_else(|| "uploads".into()),
                bucket,
            });
        }

        if let Some(v) = get("SETTINGS_DIR") {
            s.settings_dir = PathBuf::from(v);
        }
        s.cache_ttl = Duration::from_secs(parse_or("CACHE_TTL_SECS", get("CACHE_TTL_SECS"), 300)?);
        s.cache_max_entries = parse_or("CACHE_MAX_ENTRIES", get("CACHE_MAX_ENTRIES"), 10_000)?;

        if let Some(host) = get("SMTP_HOST") {
            s.smtp = Some(SmtpSettings {
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from: get("SMTP_FROM").unwrap_or_else(|| format!("kartvizit@{}", host)),
                host,
            });
        }
        s.admin_email = get("ADMIN_EMAIL");
        s.alert_webhook_url = get("ALERT_WEBHOOK_URL");
        s.chatops_webhook_url = get("CHATOPS_WEBHOOK_URL");

        s.retry = RetryPolicy {
            max_attempts: parse_or("RETRY_MAX_ATTEMPTS", get("RETRY_MAX_ATTEMPTS"), 3u32)?.max(1),
            initial_delay: Duration::from_millis(parse_or("RETRY_INITIAL_DELAY_MS", get("RETRY_INITIAL_DELAY_MS"), 200)?),
            multiplier: parse_or("RETRY_MULTIPLIER", get("RETRY_MULTIPLIER"), 2.0f64)?,
            max_delay: Duration::from_millis(parse_or("RETRY_MAX_DELAY_MS", get("RETRY_MAX_DELAY_MS"), 5_000)?),
        };
        if s.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                key: "RETRY_MULTIPLIER",
                message: "must be at least 1.0".into(),
            });
        }

        Ok(s)
    }

    /// Absolute public URL of a company card.
    pub fn public_url(&self, slug: &str) -> String {
        format!("{}/{}", self.public_base_url, slug)
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: format!("{}: {}", v, e),
        }),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert!(s.database.url.is_none());
        assert_eq!(s.database.max_connections, 5);
        assert_eq!(s.uploads.backend, UploadBackendKind::Local);
        assert_eq!(s.retry, RetryPolicy::default());
        assert!(s.smtp.is_none());
    }

    #[test]
    fn retry_policy_is_configurable() {
        let s = Settings::from_lookup(lookup(&[
            ("RETRY_MAX_ATTEMPTS", "5"),
            ("RETRY_INITIAL_DELAY_MS", "10"),
            ("RETRY_MULTIPLIER", "3"),
        ]))
        .unwrap();
        assert_eq!(s.retry.max_attempts, 5);
        assert_eq!(s.retry.initial_delay, Duration::from_millis(10));
        assert_eq!(s.retry.multiplier, 3.0);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = Settings::from_lookup(lookup(&[("DB_MAX_CONNECTIONS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DB_MAX_CONNECTIONS", .. }));
    }

    #[test]
    fn cloudinary_requires_credentials() {
        let err = Settings::from_lookup(lookup(&[("UPLOAD_BACKEND", "cloudinary")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CLOUDINARY_CLOUD_NAME")));
    }

    #[test]
    fn public_url_trims_trailing_slash() {
        let s = Settings::from_lookup(lookup(&[("PUBLIC_BASE_URL", "https://kart.example/")])).unwrap();
        assert_eq!(s.public_url("acme"), "https://kart.example/acme");
    }
}
