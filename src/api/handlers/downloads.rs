use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::download::{self, DownloadOptions, PlatformInfo, QUALITY_OPTIONS, VideoInfo};
use crate::task::TaskKind;

#[derive(Debug, Deserialize)]
pub struct VideoInfoRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub quality: Option<String>,
    pub format: Option<String>,
    #[serde(default)]
    pub audio_only: bool,
    #[serde(default)]
    pub subtitles: bool,
    pub subtitle_language: Option<String>,
    pub proxy: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskCreated {
    pub task_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct QualityOption {
    pub value: &'static str,
    pub label: &'static str,
}

impl DownloadRequest {
    fn to_options(&self, state: &AppState) -> DownloadOptions {
        DownloadOptions {
            quality: self
                .quality
                .clone()
                .unwrap_or_else(|| state.config.download.default_quality.clone()),
            format: self
                .format
                .clone()
                .unwrap_or_else(|| state.config.download.default_format.clone()),
            audio_only: self.audio_only,
            subtitles: self.subtitles,
            subtitle_language: self
                .subtitle_language
                .clone()
                .unwrap_or_else(|| "auto".to_string()),
            output_filename: None,
            output_dir: state.config.storage.files_dir.clone(),
            proxy: self.proxy.clone().or(state.config.download.proxy.clone()),
        }
    }
}

/// GET /api/v1/downloads/platforms
pub async fn platforms(State(state): State<AppState>) -> Json<Vec<PlatformInfo>> {
    Json(state.factory.platforms())
}

/// GET /api/v1/downloads/quality-options
pub async fn quality_options() -> Json<Vec<QualityOption>> {
    Json(
        QUALITY_OPTIONS
            .iter()
            .map(|(value, label)| QualityOption { value, label })
            .collect(),
    )
}

/// POST /api/v1/downloads/info
pub async fn video_info(
    State(state): State<AppState>,
    Json(request): Json<VideoInfoRequest>,
) -> ApiResult<Json<VideoInfo>> {
    download::validate_url(&request.url)?;
    let platform = state.factory.get(&request.url);
    let info = state.ytdlp.fetch_info(&request.url, platform).await?;
    Ok(Json(info))
}

/// POST /api/v1/downloads
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<TaskCreated>> {
    download::validate_url(&request.url)?;
    let options = request.to_options(&state);
    let url = request.url;

    let task_id = state.tasks.create(TaskKind::Download, None).await;
    let pipeline = state.pipeline.clone();
    state
        .tasks
        .clone()
        .start(task_id, move |handle| async move {
            pipeline.download_only(url, options, &handle).await
        })
        .await?;

    Ok(Json(TaskCreated { task_id }))
}
