// HTTP surface: REST under /api/v1, task events over WebSocket and SSE,
// produced files served from /files.

pub mod error;
pub mod handlers;
pub mod state;
pub mod ws;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use state::AppState;

use handlers::{downloads, subtitles, system, tasks};

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/downloads/platforms", get(downloads::platforms))
        .route("/downloads/quality-options", get(downloads::quality_options))
        .route("/downloads/info", post(downloads::video_info))
        .route("/downloads", post(downloads::start_download))
        .route(
            "/subtitles/generate-from-url",
            post(subtitles::generate_from_url),
        )
        .route(
            "/subtitles/generate-from-file",
            post(subtitles::generate_from_file),
        )
        .route("/subtitles/translate", post(subtitles::translate))
        .route("/subtitles/burn", post(subtitles::burn))
        .route("/subtitles/languages", get(subtitles::languages))
        .route("/subtitles/models", get(subtitles::list_models))
        .route(
            "/subtitles/models/{name}",
            post(subtitles::download_model).delete(subtitles::remove_model),
        )
        .route("/tasks", get(tasks::list))
        .route("/tasks/active", get(tasks::active))
        .route("/tasks/stream", get(tasks::stream))
        .route("/tasks/{id}", get(tasks::get).delete(tasks::remove))
        .route("/tasks/{id}/cancel", post(tasks::cancel))
        .route("/tasks/{id}/file", get(tasks::download_file))
        .route("/system/status", get(system::status))
        .route("/system/config", get(system::config))
        .route("/system/cleanup", post(system::cleanup));

    let files_dir = state.config.storage.files_dir.clone();
    let cors = cors_layer(&state.config.server.allowed_origins);

    Router::new()
        .route("/", get(system::banner))
        .route("/health", get(system::health))
        .nest("/api/v1", api)
        .route("/ws", get(ws::websocket))
        .nest_service("/files", ServeDir::new(files_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring unparseable CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
