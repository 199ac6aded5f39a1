use axum::http::StatusCode;
use axum::response::{
    IntoResponse,
    Response,
};
use axum::Json;
use serde_json::json;

use robowatch_commons::utils::error::StoreError;
use robowatch_kube::KubeError;

/// API-facing error. Every variant renders as `{"error": "<message>"}`
/// with the matching status code.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message() }));
        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(name) => ApiError::NotFound(format!("'{name}' not found")),
            StoreError::AlreadyExists(name) => {
                ApiError::Conflict(format!("'{name}' already exists"))
            }
            StoreError::Decode(message) => ApiError::Validation(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<KubeError> for ApiError {
    fn from(error: KubeError) -> Self {
        ApiError::Internal(error.to_string())
    }
}
