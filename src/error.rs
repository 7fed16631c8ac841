use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Challenge page missing expected tokens: {0}")]
    ChallengeParse(String),

    #[error("Session build failed: {0}")]
    SessionBuild(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::HttpRequest(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::JsonError(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            ApiError::ChallengeParse(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::SessionBuild(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::UpstreamUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::EmptyQuestion => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": "api_error",
                "code": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}
