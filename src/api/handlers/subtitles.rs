use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::Json;
use axum::extract::{Multipart, State};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::download::{self, DownloadOptions};
use crate::error::{JimakuError, Result};
use crate::media::BurnStyle;
use crate::pipeline::GenerateOptions;
use crate::task::TaskKind;
use crate::translate::{self, SUPPORTED_LANGUAGES};
use crate::transcribe::ModelCatalog;
use crate::transcribe::models::ModelStatus;

use super::downloads::TaskCreated;

#[derive(Debug, Deserialize)]
pub struct GenerateFromUrlRequest {
    pub url: String,
    pub quality: Option<String>,
    pub format: Option<String>,
    pub model: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    #[serde(default)]
    pub keep_video: bool,
}

#[derive(Debug, Deserialize)]
pub struct BurnRequest {
    /// Video filename inside the files directory
    pub video: String,
    /// Subtitle filename inside the files directory
    pub subtitle: String,
    #[serde(default)]
    pub style: Option<BurnStyle>,
}

#[derive(Debug, Serialize)]
pub struct LanguageEntry {
    pub code: &'static str,
    pub name: &'static str,
}

/// An uploaded file saved to the files directory plus the remaining form fields
struct Upload {
    path: PathBuf,
    original_filename: String,
    fields: HashMap<String, String>,
}

/// Reject a target language the translators cannot handle before any work runs
fn ensure_supported_target(target: Option<&str>) -> Result<()> {
    match target {
        Some(code) if !translate::is_supported_language(code) => Err(
            JimakuError::UnsupportedFormat(format!("Unsupported target language: {}", code)),
        ),
        _ => Ok(()),
    }
}

/// Reject names that would escape the files directory
fn resolve_managed_file(state: &AppState, name: &str) -> Result<PathBuf> {
    let file_name = Path::new(name)
        .file_name()
        .ok_or_else(|| JimakuError::Config(format!("Invalid filename: {}", name)))?;
    if file_name.to_string_lossy() != name {
        return Err(JimakuError::Config(format!("Invalid filename: {}", name)));
    }
    Ok(state.config.storage.files_dir.join(file_name))
}

/// Stream a multipart upload to disk. Expects one `file` field; every other
/// field is collected as text.
async fn save_upload(state: &AppState, mut multipart: Multipart) -> Result<Upload> {
    let mut saved: Option<(PathBuf, String)> = None;
    let mut fields = HashMap::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| JimakuError::Config(format!("Invalid upload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let original = field
                .file_name()
                .map(|f| f.to_string())
                .unwrap_or_else(|| "upload".to_string());
            let original_filename = Path::new(&original)
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload".to_string());

            let stored_name = format!("{}_{}", Uuid::new_v4().simple(), original_filename);
            let path = state.config.storage.files_dir.join(&stored_name);
            let mut file = tokio::fs::File::create(&path).await?;

            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| JimakuError::Config(format!("Upload interrupted: {}", e)))?
            {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            info!("Saved upload {} to {}", original_filename, path.display());
            saved = Some((path, original_filename));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| JimakuError::Config(format!("Invalid upload field: {}", e)))?;
            fields.insert(name, value);
        }
    }

    let (path, original_filename) =
        saved.ok_or_else(|| JimakuError::Config("Missing 'file' field".to_string()))?;
    Ok(Upload {
        path,
        original_filename,
        fields,
    })
}

fn generate_options_from_fields(fields: &HashMap<String, String>) -> GenerateOptions {
    GenerateOptions {
        model: fields.get("model").cloned(),
        source_language: fields.get("source_language").cloned(),
        target_language: fields.get("target_language").cloned(),
        keep_video: false,
    }
}

/// POST /api/v1/subtitles/generate-from-url
pub async fn generate_from_url(
    State(state): State<AppState>,
    Json(request): Json<GenerateFromUrlRequest>,
) -> ApiResult<Json<TaskCreated>> {
    download::validate_url(&request.url)?;
    ensure_supported_target(request.target_language.as_deref())?;

    let download_options = DownloadOptions {
        quality: request
            .quality
            .unwrap_or_else(|| state.config.download.default_quality.clone()),
        format: request
            .format
            .unwrap_or_else(|| state.config.download.default_format.clone()),
        ..DownloadOptions::default()
    };
    let options = GenerateOptions {
        model: request.model,
        source_language: request.source_language,
        target_language: request.target_language,
        keep_video: request.keep_video,
    };
    let url = request.url;

    let task_id = state.tasks.create(TaskKind::GenerateFromUrl, None).await;
    let pipeline = state.pipeline.clone();
    state
        .tasks
        .clone()
        .start(task_id, move |handle| async move {
            pipeline
                .generate_from_url(url, download_options, options, &handle)
                .await
        })
        .await?;

    Ok(Json(TaskCreated { task_id }))
}

/// POST /api/v1/subtitles/generate-from-file (multipart)
pub async fn generate_from_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<TaskCreated>> {
    let upload = save_upload(&state, multipart).await?;
    let options = generate_options_from_fields(&upload.fields);
    ensure_supported_target(options.target_language.as_deref())?;

    let task_id = state
        .tasks
        .create(TaskKind::GenerateFromFile, Some(upload.original_filename))
        .await;
    let pipeline = state.pipeline.clone();
    let path = upload.path;
    state
        .tasks
        .clone()
        .start(task_id, move |handle| async move {
            pipeline.generate_from_file(path, options, &handle).await
        })
        .await?;

    Ok(Json(TaskCreated { task_id }))
}

/// POST /api/v1/subtitles/translate (multipart SRT upload)
pub async fn translate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<TaskCreated>> {
    let upload = save_upload(&state, multipart).await?;
    let target_language = upload
        .fields
        .get("target_language")
        .cloned()
        .unwrap_or_else(|| state.config.translate.default_target_language.clone());
    ensure_supported_target(Some(&target_language))?;
    let source_language = upload.fields.get("source_language").cloned();

    let task_id = state
        .tasks
        .create(TaskKind::Translate, Some(upload.original_filename))
        .await;
    let pipeline = state.pipeline.clone();
    let path = upload.path;
    state
        .tasks
        .clone()
        .start(task_id, move |handle| async move {
            pipeline
                .translate_file(path, source_language, target_language, &handle)
                .await
        })
        .await?;

    Ok(Json(TaskCreated { task_id }))
}

/// POST /api/v1/subtitles/burn
pub async fn burn(
    State(state): State<AppState>,
    Json(request): Json<BurnRequest>,
) -> ApiResult<Json<TaskCreated>> {
    let video_path = resolve_managed_file(&state, &request.video)?;
    let subtitle_path = resolve_managed_file(&state, &request.subtitle)?;
    let style = request.style.unwrap_or_default();

    let task_id = state
        .tasks
        .create(TaskKind::Burn, Some(request.video.clone()))
        .await;
    let pipeline = state.pipeline.clone();
    state
        .tasks
        .clone()
        .start(task_id, move |handle| async move {
            pipeline.burn(video_path, subtitle_path, style, &handle).await
        })
        .await?;

    Ok(Json(TaskCreated { task_id }))
}

/// GET /api/v1/subtitles/languages
pub async fn languages() -> Json<Vec<LanguageEntry>> {
    Json(
        SUPPORTED_LANGUAGES
            .iter()
            .map(|(code, name)| LanguageEntry { code, name })
            .collect(),
    )
}

/// GET /api/v1/subtitles/models
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelStatus>> {
    Json(state.models.list())
}

/// POST /api/v1/subtitles/models/{name} — download in the background
pub async fn download_model(
    State(state): State<AppState>,
    axum::extract::Path(name): axum::extract::Path<String>,
) -> ApiResult<Json<TaskCreated>> {
    let model =
        ModelCatalog::find(&name).ok_or_else(|| JimakuError::ModelNotFound(name.clone()))?;

    let task_id = state
        .tasks
        .create(TaskKind::Download, Some(model.filename.to_string()))
        .await;
    let models = state.models.clone();
    state
        .tasks
        .clone()
        .start(task_id, move |handle| async move {
            let path = models.download(&name, &handle).await?;
            Ok(crate::task::TaskOutcome {
                output_file: Some(path),
                detail: None,
            })
        })
        .await?;

    Ok(Json(TaskCreated { task_id }))
}

/// DELETE /api/v1/subtitles/models/{name}
pub async fn remove_model(
    State(state): State<AppState>,
    axum::extract::Path(name): axum::extract::Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = state.models.remove(&name).await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_file_names_must_be_bare() {
        let state_config = crate::config::Config::default();
        // resolve_managed_file only consults the config, build a minimal state
        let state = AppState::new(state_config).unwrap();

        assert!(resolve_managed_file(&state, "movie.mp4").is_ok());
        assert!(resolve_managed_file(&state, "../etc/passwd").is_err());
        assert!(resolve_managed_file(&state, "a/b.mp4").is_err());
        assert!(resolve_managed_file(&state, "").is_err());
    }

    #[test]
    fn bad_target_language_is_rejected_before_any_task() {
        assert!(ensure_supported_target(None).is_ok());
        assert!(ensure_supported_target(Some("zh-cn")).is_ok());
        let err = ensure_supported_target(Some("klingon")).unwrap_err();
        assert!(matches!(err, JimakuError::UnsupportedFormat(_)));
    }

    #[test]
    fn generate_options_read_known_fields() {
        let mut fields = HashMap::new();
        fields.insert("model".to_string(), "base".to_string());
        fields.insert("target_language".to_string(), "ja".to_string());
        let options = generate_options_from_fields(&fields);
        assert_eq!(options.model.as_deref(), Some("base"));
        assert_eq!(options.target_language.as_deref(), Some("ja"));
        assert!(options.source_language.is_none());
    }
}
