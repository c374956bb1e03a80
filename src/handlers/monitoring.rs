//! Monitoring snapshot and external metric pushes.

use crate::error::AppError;
use crate::monitoring::{memory_usage, DatabaseHealth, MonitoringReport, MAX_CUSTOM_METRICS, MAX_METRIC_NAME_LEN};
use crate::response::{ok, ok_message};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use std::time::Instant;

async fn database_health(state: &AppState) -> DatabaseHealth {
    let started = Instant::now();
    let result = state.repo.ping().await;
    let latency_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(()) => DatabaseHealth::up(latency_ms),
        Err(e) => {
            tracing::error!(error = %e, "database ping failed");
            DatabaseHealth::down(latency_ms, "database unreachable")
        }
    }
}

/// GET /api/monitoring
pub async fn report(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let memory = tokio::task::spawn_blocking(memory_usage).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "memory sampling failed");
        Default::default()
    });
    let database = database_health(&state).await;
    let report = MonitoringReport::build(&state.metrics, memory, database, state.cache.entry_count());
    if !report.alerts.is_empty() {
        tracing::warn!(status = ?report.status, alerts = report.alerts.len(), "monitoring alerts raised");
        state.alerts.forward(&report.alerts);
    }
    Ok(ok(report))
}

#[derive(Debug, Deserialize)]
pub struct MetricPush {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub value: Option<f64>,
}

/// POST /api/monitoring `{ "type": "request" | "error" | "custom", "name"?, "value"? }`
pub async fn push(State(state): State<AppState>, Json(body): Json<MetricPush>) -> Result<impl IntoResponse, AppError> {
    match body.kind.as_str() {
        "request" => state.metrics.record_request(),
        "error" => state.metrics.record_error(),
        "custom" => {
            let name = body
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| AppError::field("name", "is required for custom metrics"))?;
            if name.chars().count() > MAX_METRIC_NAME_LEN {
                return Err(AppError::field(
                    "name",
                    format!("must be at most {} characters", MAX_METRIC_NAME_LEN),
                ));
            }
            if !state.metrics.record_custom(name, body.value.unwrap_or(1.0)) {
                return Err(AppError::field(
                    "name",
                    format!("at most {} custom metrics are tracked", MAX_CUSTOM_METRICS),
                ));
            }
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "unknown metric type {:?}; expected request, error or custom",
                other
            )))
        }
    }
    Ok(ok_message("Metric recorded"))
}
