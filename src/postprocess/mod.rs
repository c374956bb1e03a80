//! Side effects after a company write: page snapshot, QR code, cache invalidation, file cleanup.
//!
//! Tasks of one event run concurrently, each under its own retry budget. A failing task is
//! reported and logged; it never fails the write that triggered it.

pub mod retry;

pub use retry::{retry_with_backoff, Retried};

use crate::cache::PageCache;
use crate::config::RetryPolicy;
use crate::error::AppError;
use crate::models::Company;
use crate::repository::Repository;
use crate::service::pages::{CardRenderer, ICON_ORDER_NAMESPACE};
use crate::store::SettingsStore;
use crate::templates::qr_data_url;
use crate::uploads::UploadService;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostTask {
    GenerateHtml,
    RegenerateQr,
    InvalidateCache,
    CleanupFiles,
}

impl PostTask {
    pub fn name(&self) -> &'static str {
        match self {
            PostTask::GenerateHtml => "generate_html",
            PostTask::RegenerateQr => "regenerate_qr",
            PostTask::InvalidateCache => "invalidate_cache",
            PostTask::CleanupFiles => "cleanup_files",
        }
    }
}

#[derive(Clone, Debug)]
pub enum PostEvent {
    Created { company: Company },
    Updated { company: Company, old_slug: String },
    Deleted { company: Company },
}

impl PostEvent {
    pub fn company(&self) -> &Company {
        match self {
            PostEvent::Created { company } | PostEvent::Updated { company, .. } | PostEvent::Deleted { company } => {
                company
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PostEvent::Created { .. } => "created",
            PostEvent::Updated { .. } => "updated",
            PostEvent::Deleted { .. } => "deleted",
        }
    }

    pub fn tasks(&self) -> Vec<PostTask> {
        match self {
            PostEvent::Created { .. } => vec![PostTask::GenerateHtml, PostTask::RegenerateQr],
            PostEvent::Updated { company, old_slug } => {
                let mut tasks = vec![PostTask::InvalidateCache, PostTask::GenerateHtml];
                if company.slug() != old_slug || company.record.qr_code_data.is_none() {
                    tasks.push(PostTask::RegenerateQr);
                }
                tasks
            }
            PostEvent::Deleted { .. } => vec![PostTask::InvalidateCache, PostTask::CleanupFiles],
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TaskOutcome {
    pub task: PostTask,
    pub success: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PostProcessReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl PostProcessReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn outcome(&self, task: PostTask) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task == task)
    }
}

#[derive(Clone)]
pub struct PostProcessor {
    repo: Arc<dyn Repository>,
    cache: PageCache,
    renderer: CardRenderer,
    uploads: UploadService,
    store: SettingsStore,
    policy: RetryPolicy,
}

impl PostProcessor {
    pub fn new(
        repo: Arc<dyn Repository>,
        cache: PageCache,
        renderer: CardRenderer,
        uploads: UploadService,
        store: SettingsStore,
        policy: RetryPolicy,
    ) -> Self {
        PostProcessor {
            repo,
            cache,
            renderer,
            uploads,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs every task for `event` concurrently and reports each outcome.
    pub async fn run(&self, event: &PostEvent) -> PostProcessReport {
        let tasks = event.tasks();
        let outcomes = join_all(tasks.into_iter().map(|task| self.run_task(task, event))).await;
        PostProcessReport { outcomes }
    }

    /// Detaches `run` onto the runtime and logs the report when it completes.
    pub fn spawn(&self, event: PostEvent) -> JoinHandle<PostProcessReport> {
        let this = self.clone();
        tokio::spawn(async move {
            let report = this.run(&event).await;
            let company = event.company();
            for o in &report.outcomes {
                if o.success {
                    tracing::info!(
                        event = event.name(),
                        slug = %company.slug(),
                        task = o.task.name(),
                        attempts = o.attempts,
                        duration_ms = o.duration_ms,
                        "post task done"
                    );
                } else {
                    tracing::warn!(
                        event = event.name(),
                        slug = %company.slug(),
                        task = o.task.name(),
                        attempts = o.attempts,
                        error = o.error.as_deref().unwrap_or_default(),
                        "post task failed"
                    );
                }
            }
            report
        })
    }

    async fn run_task(&self, task: PostTask, event: &PostEvent) -> TaskOutcome {
        let started = Instant::now();
        let retried = retry_with_backoff(&self.policy, |_| self.execute(task, event)).await;
        TaskOutcome {
            task,
            success: retried.result.is_ok(),
            attempts: retried.attempts,
            error: retried.result.err().map(|e| e.to_string()),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn execute(&self, task: PostTask, event: &PostEvent) -> Result<(), AppError> {
        let company = event.company();
        match task {
            PostTask::GenerateHtml => {
                // re-read so a newer write is never overwritten by an older snapshot, and
                // drop the snapshot when an invalidation lands while it is being rendered
                let epoch = self.cache.epoch();
                let Some(current) = self.repo.get_company(company.id()).await? else {
                    return Ok(());
                };
                let html = self.renderer.render_card(&current).await?;
                let cached = self.cache.put_html_since(epoch, current.slug(), html).await
                    && self.cache.put_json_since(epoch, current.slug(), current.public_projection()).await;
                if !cached {
                    tracing::debug!(slug = %current.slug(), "snapshot superseded by an invalidation");
                }
                Ok(())
            }
            PostTask::RegenerateQr => {
                let data_url = qr_data_url(&self.renderer.public_url(company.slug()))?;
                self.repo.set_qr_code(company.id(), &data_url).await
            }
            PostTask::InvalidateCache => {
                match event {
                    PostEvent::Updated { old_slug, company } if old_slug != company.slug() => {
                        self.cache.invalidate_slug(old_slug).await;
                    }
                    PostEvent::Updated { .. } | PostEvent::Created { .. } => {}
                    PostEvent::Deleted { company } => self.cache.invalidate_slug(company.slug()).await,
                }
                Ok(())
            }
            PostTask::CleanupFiles => {
                let failed = self.uploads.remove_all(company.id(), &company.record.profile.file_urls()).await;
                self.store.delete(ICON_ORDER_NAMESPACE, &company.id().to_string()).await?;
                match failed.first() {
                    None => Ok(()),
                    Some((url, e)) => Err(AppError::Internal(format!(
                        "{} of {} files not removed, first {}: {}",
                        failed.len(),
                        company.record.profile.file_urls().len(),
                        url,
                        e
                    ))),
                }
            }
        }
    }
}
