use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::Stream;
use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::error::JimakuError;
use crate::task::TaskInfo;

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// GET /api/v1/tasks
pub async fn list(State(state): State<AppState>) -> Json<Vec<TaskInfo>> {
    Json(state.tasks.list().await)
}

/// GET /api/v1/tasks/active
pub async fn active(State(state): State<AppState>) -> Json<Vec<TaskInfo>> {
    Json(state.tasks.running().await)
}

/// GET /api/v1/tasks/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskInfo>> {
    let info = state
        .tasks
        .get(id)
        .await
        .ok_or_else(|| JimakuError::TaskNotFound(id.to_string()))?;
    Ok(Json(info))
}

/// POST /api/v1/tasks/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<CancelResponse> {
    let cancelled = state.tasks.cancel(id).await;
    Json(CancelResponse { cancelled })
}

/// DELETE /api/v1/tasks/{id}
pub async fn remove(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.tasks.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/tasks/{id}/file — stream the result file as an attachment
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let download = state
        .tasks
        .download_info(id)
        .await
        .ok_or_else(|| JimakuError::TaskNotFound(format!("no downloadable result for {}", id)))?;

    let file = tokio::fs::File::open(&download.file_path)
        .await
        .map_err(|_| JimakuError::FileNotFound(download.file_path.display().to_string()))?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.download_filename.replace('"', "_")
    );
    let response = (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response();
    Ok(response)
}

/// GET /api/v1/tasks/stream — SSE: current snapshot, then live events
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let snapshot = state.tasks.list().await;
    let rx = state.tasks.subscribe();

    let initial = futures::stream::iter(snapshot.into_iter().map(|task| {
        let data = serde_json::to_string(&task).unwrap_or_default();
        Ok(SseEvent::default().event("snapshot").data(data))
    }));

    let live = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(SseEvent::default().data(data)))
        }
        // Lagged receivers skip missed events
        Err(_) => None,
    });

    Sse::new(initial.chain(live)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
