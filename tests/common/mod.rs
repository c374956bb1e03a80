#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use kartvizit::config::RetryPolicy;
use kartvizit::mail::MemoryMailer;
use kartvizit::uploads::{LocalBackend, UploadService};
use kartvizit::{app_router, AppState, MemoryRepository, Settings};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BASE_URL: &str = "https://kartvizit.test";
pub const ADMIN_PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<MemoryMailer>,
    pub token: String,
    pub dir: TempDir,
}

pub fn test_settings(dir: &std::path::Path) -> Settings {
    let mut s = Settings::default();
    s.public_base_url = BASE_URL.into();
    s.uploads.dir = dir.join("uploads");
    s.uploads.url_prefix = "/uploads".into();
    s.settings_dir = dir.join("settings");
    s.auth.session_secret = "integration-test-secret-0123456789".into();
    s.auth.admin_password = Some(ADMIN_PASSWORD.into());
    s.admin_email = Some("admin@kartvizit.test".into());
    s.retry = RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(5),
    };
    s
}

pub fn spawn_app_with(settings: Settings, dir: TempDir, mailer: MemoryMailer) -> TestApp {
    let mailer = Arc::new(mailer);
    let uploads = UploadService::new(Arc::new(LocalBackend::new(
        settings.uploads.dir.clone(),
        settings.uploads.url_prefix.clone(),
    )));
    let state = AppState::new(
        settings,
        Arc::new(MemoryRepository::new()),
        uploads,
        mailer.clone(),
        reqwest::Client::new(),
    )
    .unwrap();
    let (token, _) = state.sessions.issue("admin").unwrap();
    TestApp {
        router: app_router(state.clone()),
        state,
        mailer,
        token,
        dir,
    }
}

pub fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    spawn_app_with(settings, dir, MemoryMailer::new())
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| panic!("not json ({e}): {}", self.text()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec();
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_json(&self, uri: &str) -> TestResponse {
        self.send(
            Request::get(uri)
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// JSON request; `authed` adds the admin session cookie.
    pub async fn json(&self, method: &str, uri: &str, body: Value, authed: bool) -> TestResponse {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if authed {
            req = req.header(header::COOKIE, format!("kartvizit_session={}", self.token));
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn delete(&self, uri: &str, authed: bool) -> TestResponse {
        let mut req = Request::delete(uri);
        if authed {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", self.token));
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    /// Creates a company as admin and returns its id.
    pub async fn create_company(&self, body: Value) -> i64 {
        let resp = self.json("POST", "/api/companies", body, true).await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
        let id = resp.json()["data"]["id"].as_i64().unwrap();
        settle().await;
        id
    }
}

/// Lets detached post-processing tasks finish.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
