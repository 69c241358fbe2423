use std::time::Duration;

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::Serialize;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::task::TaskStatus;
use crate::tempfiles;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub uptime_secs: i64,
    pub tasks_total: usize,
    pub tasks_running: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub ytdlp_available: bool,
    pub ffmpeg_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResult {
    pub removed_tasks: usize,
    pub removed_files: u64,
}

/// GET /
pub async fn banner() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/v1/system/status
pub async fn status(State(state): State<AppState>) -> Json<SystemStatus> {
    let tasks = state.tasks.list().await;
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();

    let ytdlp_available = state.ytdlp.check_availability().await.is_ok();
    let ffmpeg_version = state.media.check_availability().await.ok();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        tasks_total: tasks.len(),
        tasks_running: count(TaskStatus::Running),
        tasks_completed: count(TaskStatus::Completed),
        tasks_failed: count(TaskStatus::Failed),
        ytdlp_available,
        ffmpeg_version,
    })
}

/// GET /api/v1/system/config — safe subset, no proxy credentials
pub async fn config(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = &state.config;
    Json(serde_json::json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port,
        },
        "download": {
            "default_quality": config.download.default_quality,
            "default_format": config.download.default_format,
            "proxy_configured": config.download.proxy.is_some(),
        },
        "transcriber": {
            "default_model": config.transcriber.default_model,
        },
        "translate": {
            "default_target_language": config.translate.default_target_language,
            "fallback_enabled": config.translate.fallback_enabled,
        },
        "tasks": {
            "retention_secs": config.tasks.retention_secs,
        },
    }))
}

/// POST /api/v1/system/cleanup — manual retention + stale temp sweep
pub async fn cleanup(State(state): State<AppState>) -> ApiResult<Json<CleanupResult>> {
    let removed_tasks = state.tasks.cleanup_expired().await;
    let retention = Duration::from_secs(state.config.tasks.retention_secs);
    let removed_files = tempfiles::sweep_stale(&state.config.storage.temp_dir, retention)?;
    Ok(Json(CleanupResult {
        removed_tasks,
        removed_files,
    }))
}
