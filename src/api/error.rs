use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::error::JimakuError;

/// Domain error wrapped for the HTTP layer
pub struct ApiError(pub JimakuError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<JimakuError> for ApiError {
    fn from(err: JimakuError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            JimakuError::InvalidUrl(_)
            | JimakuError::Config(_)
            | JimakuError::UnsupportedFormat(_)
            | JimakuError::TaskState(_) => StatusCode::BAD_REQUEST,
            JimakuError::FileNotFound(_)
            | JimakuError::TaskNotFound(_)
            | JimakuError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
        }

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: JimakuError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn error_variants_map_to_http_statuses() {
        assert_eq!(
            status_of(JimakuError::InvalidUrl("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(JimakuError::TaskNotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(JimakuError::ModelNotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(JimakuError::Media("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
