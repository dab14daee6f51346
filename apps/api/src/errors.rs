use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::capillary::calculator::CalculationError;
use crate::capillary::validation::{FieldIssue, ValidationError};
use crate::llm_client::LlmError;

/// Appended to every model failure shown to a caller.
const CHECK_LOGS_HINT: &str = "Check server logs for more details.";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model output invalid: {0}")]
    ModelOutputInvalid(ValidationError),

    #[error("Model output error: {0}")]
    ModelOutput(String),

    #[error("Model transport error: {0}")]
    ModelTransport(#[from] LlmError),
}

impl From<CalculationError> for AppError {
    fn from(err: CalculationError) -> Self {
        match err {
            CalculationError::InvalidOutput(e) => AppError::ModelOutputInvalid(e),
            CalculationError::ModelOutput(msg) => AppError::ModelOutput(msg),
            CalculationError::Transport(e) => AppError::ModelTransport(e),
        }
    }
}

/// Malformed or mistyped bodies are reported like any other validation failure.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(ValidationError {
            issues: vec![FieldIssue {
                field: "$".to_string(),
                message: rejection.body_text(),
            }],
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                e.to_string(),
                Some(json!(e.issues)),
            ),
            AppError::ModelOutputInvalid(e) => {
                tracing::error!("Model output invalid: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "MODEL_OUTPUT_INVALID",
                    format!("Model output failed validation: {e}. {CHECK_LOGS_HINT}"),
                    Some(json!(e.issues)),
                )
            }
            AppError::ModelOutput(msg) => {
                tracing::error!("Model output error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "MODEL_OUTPUT_ERROR",
                    format!("{msg} {CHECK_LOGS_HINT}"),
                    None,
                )
            }
            AppError::ModelTransport(e) => {
                tracing::error!("Model transport error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "MODEL_TRANSPORT_ERROR",
                    format!("{e}. {CHECK_LOGS_HINT}"),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["issues"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
