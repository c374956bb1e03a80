//! HTTP handlers grouped by surface: admin API, public pages, monitoring.

pub mod auth;
pub mod companies;
pub mod content;
pub mod inquiry;
pub mod monitoring;
pub mod public;
pub mod templates;
