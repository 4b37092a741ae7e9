use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use deadwatch_application::AppError;

#[derive(Debug)]
pub enum HttpError {
    Unauthorized,
    BadRequest(String),
    NotFound(String),
    Capacity(String),
    Internal,
}

impl From<AppError> for HttpError {
    fn from(value: AppError) -> Self {
        match value {
            AppError::Unauthorized => HttpError::Unauthorized,
            AppError::BadRequest(msg) => HttpError::BadRequest(msg),
            AppError::NotFound(msg) => HttpError::NotFound(msg),
            AppError::Capacity(msg) => HttpError::Capacity(msg),
            AppError::Internal(err) => {
                error!("request failed: {:#}", err);
                HttpError::Internal
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, format!("bad request: {}", msg)),
            HttpError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            HttpError::Capacity(msg) => (StatusCode::CONFLICT, msg),
            HttpError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
