//! Shared application state for all routes.

use crate::auth::SessionKeys;
use crate::cache::PageCache;
use crate::config::Settings;
use crate::error::AppError;
use crate::mail::{LogMailer, Mailer, SmtpMailer};
use crate::monitoring::{AlertForwarder, Metrics};
use crate::postprocess::PostProcessor;
use crate::repository::Repository;
use crate::service::pages::CardRenderer;
use crate::store::SettingsStore;
use crate::templates::TemplateRegistry;
use crate::uploads::UploadService;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub repo: Arc<dyn Repository>,
    pub templates: Arc<TemplateRegistry>,
    pub renderer: CardRenderer,
    pub cache: PageCache,
    pub store: SettingsStore,
    pub uploads: UploadService,
    pub mailer: Arc<dyn Mailer>,
    pub sessions: Arc<SessionKeys>,
    pub metrics: Arc<Metrics>,
    pub alerts: Arc<AlertForwarder>,
    pub post: PostProcessor,
    pub http: reqwest::Client,
}

pub fn http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(concat!("kartvizit/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal(format!("http client: {}", e)))
}

impl AppState {
    /// Wires every service around the given repository, upload service and mailer.
    pub fn new(
        settings: Settings,
        repo: Arc<dyn Repository>,
        uploads: UploadService,
        mailer: Arc<dyn Mailer>,
        http: reqwest::Client,
    ) -> Result<Self, AppError> {
        let templates = Arc::new(TemplateRegistry::new()?);
        let store = SettingsStore::new(settings.settings_dir.clone());
        let cache = PageCache::new(settings.cache_ttl, settings.cache_max_entries);
        let renderer = CardRenderer::new(templates.clone(), store.clone(), settings.public_base_url.clone());
        let sessions = Arc::new(SessionKeys::from_settings(&settings.auth)?);
        let alerts = Arc::new(AlertForwarder::new(
            http.clone(),
            settings.alert_webhook_url.clone(),
            settings.chatops_webhook_url.clone(),
        ));
        let post = PostProcessor::new(
            repo.clone(),
            cache.clone(),
            renderer.clone(),
            uploads.clone(),
            store.clone(),
            settings.retry.clone(),
        );
        Ok(AppState {
            settings: Arc::new(settings),
            repo,
            templates,
            renderer,
            cache,
            store,
            uploads,
            mailer,
            sessions,
            metrics: Arc::new(Metrics::new()),
            alerts,
            post,
            http,
        })
    }

    /// Upload backend and mailer chosen from settings.
    pub async fn from_settings(settings: Settings, repo: Arc<dyn Repository>) -> Result<Self, AppError> {
        let http = http_client()?;
        let uploads = UploadService::from_settings(&settings.uploads, http.clone()).await?;
        let mailer: Arc<dyn Mailer> = match &settings.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => Arc::new(LogMailer),
        };
        tracing::info!(mailer = mailer.name(), "mailer ready");
        Self::new(settings, repo, uploads, mailer, http)
    }
}
