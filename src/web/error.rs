use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::error;

use crate::db::services::IngestError;
use crate::server::device_ops::DeviceOpError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Device unreachable: {0}")]
    Unreachable(String),
    #[error("Device protocol failure: {0}")]
    Protocol(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Unreachable(_) => "unreachable",
            AppError::Protocol(_) => "protocol",
            AppError::DatabaseError(_) => "persistence",
            AppError::InternalServerError(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unreachable(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            AppError::Protocol(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::DatabaseError(msg) => {
                error!(error = %msg, "Request failed on a database error.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Database error: {msg}"),
                )
            }
            AppError::InternalServerError(msg) => {
                error!(error = %msg, "Request failed.");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (
            status,
            Json(serde_json::json!({ "error": error_message, "kind": kind })),
        )
            .into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Database(db_err) => AppError::DatabaseError(db_err.to_string()),
        }
    }
}

impl From<DeviceOpError> for AppError {
    fn from(err: DeviceOpError) -> Self {
        match err {
            DeviceOpError::NotFound(id) => AppError::NotFound(format!("Device {id} not found")),
            DeviceOpError::Inactive(id) => {
                AppError::Conflict(format!("Device {id} is inactive"))
            }
            DeviceOpError::InvalidAddress(msg) => AppError::InvalidInput(msg),
            DeviceOpError::Unreachable(msg) => AppError::Unreachable(msg),
            DeviceOpError::Protocol(msg) => AppError::Protocol(msg),
            DeviceOpError::Persistence(db_err) => AppError::DatabaseError(db_err.to_string()),
            DeviceOpError::Task(msg) => AppError::InternalServerError(msg),
        }
    }
}
