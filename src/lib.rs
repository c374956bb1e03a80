//! kartvizit: multi-tenant digital business card backend on axum and PostgreSQL.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod iban;
pub mod mail;
pub mod migration;
pub mod models;
pub mod monitoring;
pub mod postprocess;
pub mod repository;
pub mod response;
pub mod routes;
pub mod service;
pub mod slug;
pub mod sql;
pub mod state;
pub mod store;
pub mod templates;
pub mod uploads;

pub use config::Settings;
pub use error::{AppError, ConfigError};
pub use migration::{apply_schema, ensure_database_exists, seed};
pub use repository::{MemoryRepository, PgRepository, Repository};
pub use routes::app_router;
pub use state::AppState;
