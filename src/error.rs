use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::models::ProductId;

/// Failures of the backing store itself. Never recovered locally.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed product collection: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt product record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Product {0} not found")]
    NotFound(ProductId),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Storage Error: {0}")]
    Storage(#[from] StorageError),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Storage(err.into())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Storage(err.into())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Upload Error: {0}")]
    Upload(#[from] std::io::Error),

    #[error("Rendering Error: {0}")]
    Render(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Store(StoreError::NotFound(id)) => {
                tracing::debug!(product_id = id, "Responding with not found");
                HttpResponse::NotFound().json(json!({"error": format!("Product {} not found", id)}))
            }
            AppError::NotFound(m) => {
                tracing::debug!(detail = %m, "Responding with not found");
                HttpResponse::NotFound().json(json!({"error": m}))
            }
            AppError::Store(StoreError::Validation(m)) | AppError::Validation(m) => {
                tracing::debug!(detail = %m, "Responding with validation error");
                HttpResponse::BadRequest().json(json!({"error": m}))
            }
            other => {
                tracing::error!(application_error = %other, "Responding with error");
                HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred"}))
            }
        }
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
