//! Service Error Types
//!
//! Error kinds surfaced by the quest service and their HTTP mapping.
//! Ledger unique-constraint hits are not represented here: the database
//! layer swallows them as benign dedup results.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Target entity missing or not owned by the requesting user
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed input identifiers
    #[error("invalid request: {0}")]
    Validation(String),
    /// Statistics provider unreachable or malformed; the current update
    /// cycle is aborted without partial commits and may be retried
    #[error("match provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Provider(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
