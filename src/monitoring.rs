//! Request metrics, health report with threshold alerts, and alert forwarding.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use sysinfo::{ProcessesToUpdate, System};

pub const MEMORY_CRITICAL_PERCENT: f64 = 90.0;
pub const MEMORY_WARNING_PERCENT: f64 = 75.0;
pub const ERROR_RATE_ERROR_PERCENT: f64 = 10.0;
pub const ERROR_RATE_WARNING_PERCENT: f64 = 5.0;
/// The error-level error-rate alert needs at least this many requests.
pub const ERROR_RATE_MIN_REQUESTS: u64 = 20;
pub const DB_LATENCY_WARNING_MS: u64 = 1000;

/// Distinct custom metric names kept; pushes for new names beyond this are refused.
pub const MAX_CUSTOM_METRICS: usize = 100;
pub const MAX_METRIC_NAME_LEN: usize = 64;

/// Same alert kind is forwarded at most once per window.
const FORWARD_COOLDOWN: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    started_at: DateTime<Utc>,
    requests: AtomicU64,
    errors: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
    custom: RwLock<BTreeMap<String, f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestCounters {
    pub total: u64,
    pub errors: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    /// Percent of requests that errored.
    pub error_rate: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            started: Instant::now(),
            started_at: Utc::now(),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            custom: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn record_response(&self, status: u16) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if (400..500).contains(&status) {
            self.client_errors.fetch_add(1, Ordering::Relaxed);
        } else if status >= 500 {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Request reported by a client (e.g. the admin UI) rather than seen by the middleware.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// A client-side failure; it counts as a request too so the error rate stays a true ratio.
    pub fn record_error(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `value` to the named custom counter. Returns `false` when `name` is new and
    /// `MAX_CUSTOM_METRICS` names are already tracked.
    pub fn record_custom(&self, name: &str, value: f64) -> bool {
        let mut custom = match self.custom.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(total) = custom.get_mut(name) {
            *total += value;
            return true;
        }
        if custom.len() >= MAX_CUSTOM_METRICS {
            return false;
        }
        custom.insert(name.to_string(), value);
        true
    }

    pub fn custom(&self) -> BTreeMap<String, f64> {
        match self.custom.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn counters(&self) -> RequestCounters {
        let total = self.requests.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        RequestCounters {
            total,
            errors,
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            error_rate: if total == 0 {
                0.0
            } else {
                errors as f64 / total as f64 * 100.0
            },
        }
    }
}

/// Counts every response by status class.
pub async fn track_requests(State(metrics): State<Arc<Metrics>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    metrics.record_response(response.status().as_u16());
    response
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub process_rss_bytes: Option<u64>,
    pub system_total_bytes: u64,
    pub system_used_bytes: u64,
    pub usage_percent: f64,
}

/// Snapshot of process and system memory.
pub fn memory_usage() -> MemoryUsage {
    let mut sys = System::new();
    sys.refresh_memory();
    let process_rss_bytes = sysinfo::get_current_pid().ok().and_then(|pid| {
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid).map(|p| p.memory())
    });
    let total = sys.total_memory();
    let used = sys.used_memory();
    MemoryUsage {
        process_rss_bytes,
        system_total_bytes: total,
        system_used_bytes: used,
        usage_percent: if total > 0 {
            used as f64 / total as f64 * 100.0
        } else {
            0.0
        },
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Error,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub kind: &'static str,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatabaseHealth {
    pub status: &'static str,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DatabaseHealth {
    pub fn up(latency_ms: u64) -> Self {
        DatabaseHealth {
            status: "up",
            latency_ms,
            error: None,
        }
    }

    pub fn down(latency_ms: u64, error: impl Into<String>) -> Self {
        DatabaseHealth {
            status: "down",
            latency_ms,
            error: Some(error.into()),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

pub fn evaluate_alerts(memory: &MemoryUsage, requests: &RequestCounters, db: &DatabaseHealth) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let mem = memory.usage_percent;
    if mem > MEMORY_CRITICAL_PERCENT {
        alerts.push(Alert {
            level: AlertLevel::Critical,
            kind: "memory",
            message: format!("memory usage at {:.1}%", mem),
            value: mem,
            threshold: MEMORY_CRITICAL_PERCENT,
        });
    } else if mem > MEMORY_WARNING_PERCENT {
        alerts.push(Alert {
            level: AlertLevel::Warning,
            kind: "memory",
            message: format!("memory usage at {:.1}%", mem),
            value: mem,
            threshold: MEMORY_WARNING_PERCENT,
        });
    }

    let rate = requests.error_rate;
    if rate > ERROR_RATE_ERROR_PERCENT && requests.total >= ERROR_RATE_MIN_REQUESTS {
        alerts.push(Alert {
            level: AlertLevel::Error,
            kind: "error_rate",
            message: format!("error rate at {:.1}% over {} requests", rate, requests.total),
            value: rate,
            threshold: ERROR_RATE_ERROR_PERCENT,
        });
    } else if rate > ERROR_RATE_WARNING_PERCENT {
        alerts.push(Alert {
            level: AlertLevel::Warning,
            kind: "error_rate",
            message: format!("error rate at {:.1}%", rate),
            value: rate,
            threshold: ERROR_RATE_WARNING_PERCENT,
        });
    }

    if !db.is_up() {
        alerts.push(Alert {
            level: AlertLevel::Critical,
            kind: "database",
            message: format!("database unreachable: {}", db.error.as_deref().unwrap_or("unknown error")),
            value: 0.0,
            threshold: 1.0,
        });
    } else if db.latency_ms > DB_LATENCY_WARNING_MS {
        alerts.push(Alert {
            level: AlertLevel::Warning,
            kind: "database_latency",
            message: format!("database answered in {} ms", db.latency_ms),
            value: db.latency_ms as f64,
            threshold: DB_LATENCY_WARNING_MS as f64,
        });
    }
    alerts
}

pub fn overall_status(alerts: &[Alert]) -> HealthStatus {
    match alerts.iter().map(|a| a.level).max() {
        Some(AlertLevel::Critical) => HealthStatus::Unhealthy,
        Some(_) => HealthStatus::Degraded,
        None => HealthStatus::Healthy,
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MonitoringReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub memory: MemoryUsage,
    pub database: DatabaseHealth,
    pub requests: RequestCounters,
    pub cache: CacheStats,
    pub custom: BTreeMap<String, f64>,
    pub alerts: Vec<Alert>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    pub entries: u64,
}

impl MonitoringReport {
    pub fn build(metrics: &Metrics, memory: MemoryUsage, database: DatabaseHealth, cache_entries: u64) -> Self {
        let requests = metrics.counters();
        let alerts = evaluate_alerts(&memory, &requests, &database);
        MonitoringReport {
            status: overall_status(&alerts),
            timestamp: Utc::now(),
            started_at: metrics.started_at(),
            uptime_seconds: metrics.uptime().as_secs(),
            memory,
            database,
            requests,
            cache: CacheStats { entries: cache_entries },
            custom: metrics.custom(),
            alerts,
        }
    }
}

/// Posts critical and error alerts to the alert webhook (JSON) and the chat webhook (`{text}`).
pub struct AlertForwarder {
    http: reqwest::Client,
    alert_url: Option<String>,
    chatops_url: Option<String>,
    last_sent: Mutex<HashMap<&'static str, Instant>>,
}

impl AlertForwarder {
    pub fn new(http: reqwest::Client, alert_url: Option<String>, chatops_url: Option<String>) -> Self {
        AlertForwarder {
            http,
            alert_url,
            chatops_url,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.alert_url.is_some() || self.chatops_url.is_some()
    }

    /// Alerts worth forwarding now: error or worse, and not sent within the cooldown.
    fn due(&self, alerts: &[Alert]) -> Vec<Alert> {
        let mut last = match self.last_sent.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        alerts
            .iter()
            .filter(|a| a.level >= AlertLevel::Error)
            .filter(|a| match last.get(a.kind) {
                Some(at) if now.duration_since(*at) < FORWARD_COOLDOWN => false,
                _ => {
                    last.insert(a.kind, now);
                    true
                }
            })
            .cloned()
            .collect()
    }

    /// Best-effort and detached; delivery failures are only logged.
    pub fn forward(&self, alerts: &[Alert]) {
        if !self.is_configured() {
            return;
        }
        let due = self.due(alerts);
        if due.is_empty() {
            return;
        }
        let http = self.http.clone();
        let alert_url = self.alert_url.clone();
        let chatops_url = self.chatops_url.clone();
        tokio::spawn(async move {
            if let Some(url) = alert_url {
                let body = serde_json::json!({
                    "source": "kartvizit",
                    "timestamp": Utc::now(),
                    "alerts": due,
                });
                if let Err(e) = http.post(&url).json(&body).send().await.and_then(|r| r.error_for_status()) {
                    tracing::warn!(error = %e, "alert webhook delivery failed");
                }
            }
            if let Some(url) = chatops_url {
                let text = due
                    .iter()
                    .map(|a| format!("[{:?}] {}", a.level, a.message))
                    .collect::<Vec<_>>()
                    .join("\n");
                let body = serde_json::json!({ "text": format!("kartvizit alerts:\n{}", text) });
                if let Err(e) = http.post(&url).json(&body).send().await.and_then(|r| r.error_for_status()) {
                    tracing::warn!(error = %e, "chatops webhook delivery failed");
                }
            }
        });
    }
}
