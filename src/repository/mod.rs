//! Persistence behind one interface: Postgres in production, in-memory for dev and tests.

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use crate::config::ContentKind;
use crate::error::AppError;
use crate::models::{Company, CompanyDraft, CompanyQuery, CompanyRecord};
use crate::sql::PgBindValue;
use async_trait::async_trait;
use serde_json::Value;

/// Typed column values for a content write, already validated and coerced.
pub type ContentValues = Vec<(&'static str, PgBindValue)>;

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// Newest first, filtered by name or slug substring.
    async fn list_companies(&self, query: &CompanyQuery) -> Result<Vec<CompanyRecord>, AppError>;

    async fn get_company(&self, id: i64) -> Result<Option<Company>, AppError>;

    async fn get_company_by_slug(&self, slug: &str) -> Result<Option<Company>, AppError>;

    /// Fails with `Conflict` when the slug is taken.
    async fn create_company(&self, draft: &CompanyDraft) -> Result<Company, AppError>;

    /// Replaces the row and all child collections. `None` when the id is unknown.
    async fn update_company(&self, id: i64, draft: &CompanyDraft) -> Result<Option<Company>, AppError>;

    /// Returns the removed aggregate; children go with it.
    async fn delete_company(&self, id: i64) -> Result<Option<Company>, AppError>;

    async fn increment_views(&self, slug: &str) -> Result<(), AppError>;

    /// `NotFound` when the company is gone.
    async fn set_qr_code(&self, id: i64, data_url: &str) -> Result<(), AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Ordered by `display_order`, then `id`.
    async fn list_content(&self, kind: ContentKind, include_inactive: bool) -> Result<Vec<Value>, AppError>;

    async fn get_content(&self, kind: ContentKind, id: i64) -> Result<Option<Value>, AppError>;

    async fn create_content(&self, kind: ContentKind, values: &ContentValues) -> Result<Value, AppError>;

    async fn update_content(&self, kind: ContentKind, id: i64, values: &ContentValues) -> Result<Option<Value>, AppError>;

    async fn delete_content(&self, kind: ContentKind, id: i64) -> Result<Option<Value>, AppError>;

    /// Sets `display_order` to each id's index. All ids must exist, otherwise nothing changes.
    async fn reorder_content(&self, kind: ContentKind, ids: &[i64]) -> Result<(), AppError>;
}

pub trait Repository: CompanyRepository + ContentRepository {}

impl<T: CompanyRepository + ContentRepository> Repository for T {}
