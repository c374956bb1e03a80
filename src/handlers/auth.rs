//! Admin login, logout and session lookup.

use crate::auth::SessionKeys;
use crate::error::AppError;
use crate::extractors::AdminSession;
use crate::response::{ok, ok_message, ok_with_message};
use crate::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/auth/login
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Result<impl IntoResponse, AppError> {
    let username = body.username.trim();
    if !state.sessions.check_credentials(username, &body.password).await? {
        tracing::warn!(username = %username, "login rejected");
        return Err(AppError::Unauthorized);
    }
    let (token, claims) = state.sessions.issue(username)?;
    tracing::info!(username = %username, "admin signed in");
    Ok((
        [(header::SET_COOKIE, state.sessions.cookie(&token))],
        ok_with_message(
            json!({ "token": token, "username": claims.sub, "expires_at": claims.exp }),
            "Signed in",
        ),
    ))
}

/// POST /api/auth/logout
pub async fn logout() -> impl IntoResponse {
    ([(header::SET_COOKIE, SessionKeys::clear_cookie())], ok_message("Signed out"))
}

/// GET /api/auth/session
pub async fn session(AdminSession(claims): AdminSession) -> impl IntoResponse {
    ok(json!({ "username": claims.sub, "issued_at": claims.iat, "expires_at": claims.exp }))
}
