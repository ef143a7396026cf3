use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures raised by the recording and replay engine.
///
/// Session and storage failures end the current operation. `ElementNotFound`
/// and `ActionExecutionFailure` are per-step and never abort a replay; the
/// orchestrator folds them into the step report instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to start browser session: {0}")]
    SessionStartFailure(String),

    #[error("Failed to write recording: {0}")]
    StoreWriteFailure(String),

    #[error("Failed to read recording: {0}")]
    StoreReadFailure(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Action failed: {0}")]
    ActionExecutionFailure(String),

    #[error("Recording not found: {0}")]
    NotFound(String),

    #[error("Unknown placeholder(s): {}", .0.join(", "))]
    Substitution(Vec<String>),

    #[error("No active capture: {0}")]
    NoActiveCapture(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Invalid request: {0}")]
    ValidationError(String),

    #[error("Replay not found: {0}")]
    ReplayNotFound(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Engine(EngineError::NotFound(_))
            | AppError::Engine(EngineError::NoActiveCapture(_))
            | AppError::ReplayNotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            AppError::Engine(EngineError::Substitution(_)) | AppError::ValidationError(_) => {
                (StatusCode::BAD_REQUEST, "Bad Request")
            }
            AppError::Engine(EngineError::SessionStartFailure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Browser Error")
            }
            AppError::Engine(EngineError::StoreWriteFailure(_))
            | AppError::Engine(EngineError::StoreReadFailure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage Error")
            }
            AppError::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Engine Error"),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
