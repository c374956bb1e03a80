//! Admin sessions: argon2 password check, HS256 session tokens.

use crate::config::AuthSettings;
use crate::error::{AppError, ConfigError};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SESSION_COOKIE: &str = "kartvizit_session";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing keys plus the single admin credential.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    admin_username: String,
    /// `None` disables login entirely.
    admin_password_hash: Option<String>,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl", &self.ttl)
            .field("admin_username", &self.admin_username)
            .finish_non_exhaustive()
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| AppError::Internal(format!("salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing: {}", e)))
}

pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

impl SessionKeys {
    pub fn from_settings(auth: &AuthSettings) -> Result<Self, AppError> {
        let admin_password_hash = match (&auth.admin_password_hash, &auth.admin_password) {
            (Some(hash), _) => {
                PasswordHash::new(hash).map_err(|e| {
                    AppError::Config(ConfigError::Invalid {
                        key: "ADMIN_PASSWORD_HASH",
                        message: e.to_string(),
                    })
                })?;
                Some(hash.clone())
            }
            (None, Some(plain)) => Some(hash_password(plain)?),
            (None, None) => {
                tracing::warn!("no admin password configured; login is disabled");
                None
            }
        };
        Ok(SessionKeys {
            encoding: EncodingKey::from_secret(auth.session_secret.as_bytes()),
            decoding: DecodingKey::from_secret(auth.session_secret.as_bytes()),
            ttl: auth.session_ttl,
            admin_username: auth.admin_username.clone(),
            admin_password_hash,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Argon2 is CPU-bound, so verification runs on the blocking pool.
    pub async fn check_credentials(&self, username: &str, password: &str) -> Result<bool, AppError> {
        let Some(hash) = self.admin_password_hash.clone() else {
            return Ok(false);
        };
        if username != self.admin_username {
            return Ok(false);
        }
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("password check task: {}", e)))
    }

    pub fn issue(&self, subject: &str) -> Result<(String, SessionClaims), AppError> {
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token signing: {}", e)))?;
        Ok((token, claims))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
    }

    /// `Set-Cookie` value carrying the token.
    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.ttl.as_secs()
        )
    }

    pub fn clear_cookie() -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
    }
}
