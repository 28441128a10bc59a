use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::backup::{BackupError, RestoreError};
use crate::docker::DockerError;

/// Application-wide error taxonomy. Every variant renders as a single
/// human-readable string; the dashboard never receives structured
/// validation objects.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Container engine is not available")]
    EngineUnavailable,
    #[error("Image pull failed: {0}")]
    ImagePull(String),
    #[error("Port conflict: {0}")]
    PortConflict(String),
    #[error("Update failed: {0}")]
    UpdateFailed(String),
    #[error("Backup failed: {0}")]
    Backup(String),
    #[error("Restore failed: {0}")]
    Restore(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ImagePull(_) => StatusCode::BAD_GATEWAY,
            AppError::PortConflict(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::UpdateFailed(_)
            | AppError::Backup(_)
            | AppError::Restore(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON serialization error: {err}"))
    }
}

impl From<DockerError> for AppError {
    fn from(err: DockerError) -> Self {
        match err {
            DockerError::Unavailable(_) => AppError::EngineUnavailable,
            DockerError::NotFound(msg) => AppError::NotFound(msg),
            DockerError::ImagePull { .. } => AppError::ImagePull(err.to_string()),
            DockerError::PortConflict(msg) => AppError::PortConflict(msg),
            DockerError::Conflict(msg) => AppError::Conflict(msg),
            DockerError::Api(msg) => AppError::Internal(msg),
        }
    }
}

impl From<BackupError> for AppError {
    fn from(err: BackupError) -> Self {
        AppError::Backup(err.to_string())
    }
}

impl From<RestoreError> for AppError {
    fn from(err: RestoreError) -> Self {
        AppError::Restore(err.to_string())
    }
}
