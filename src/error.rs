use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        payload: Option<Value>,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("Integration error: {0}")]
    Integration(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            payload: None,
        }
    }

    /// Validation failure that echoes the offending input back to the caller.
    pub fn invalid_payload(message: impl Into<String>, payload: &Value) -> Self {
        AppError::Validation {
            message: message.into(),
            payload: Some(payload.clone()),
        }
    }

    /// Machine-readable kind carried in every error response.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Storage(_) => "storage_error",
            AppError::Integration(_) => "integration_error",
            AppError::Config(_) | AppError::Other(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message, payload) = match self {
            AppError::Validation { message, payload } => {
                (StatusCode::BAD_REQUEST, message, payload)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Storage(ref e) => {
                tracing::error!(error = ?e, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage error".to_string(),
                    None,
                )
            }
            AppError::Integration(ref msg) => {
                tracing::error!("Integration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to integrate reading".to_string(),
                    None,
                )
            }
            ref other => {
                tracing::error!("Internal error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "success": false,
            "kind": kind,
            "error": message,
        });
        if let Some(payload) = payload {
            body["payload"] = payload;
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
