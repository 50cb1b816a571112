//! Error responses for the empresa API.
//!
//! Every failure renders as `{"error": "<message>"}`. Which status a
//! service error gets depends on the route it happened on.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use matriz_core::processors::ServiceError;
use matriz_sdk::objects::ErrorResponse;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    /// Create and update: every failure is reported as a client error,
    /// storage faults included.
    pub fn from_write(error: ServiceError) -> Self {
        if let ServiceError::Dependency(e) = &error {
            tracing::warn!(error = %e, "Write failed on the store");
        }
        ApiError::BadRequest(error.to_string())
    }

    /// Single record lookup: any failure reads as "não encontrado".
    pub fn from_read(error: ServiceError) -> Self {
        if let ServiceError::Dependency(e) = &error {
            tracing::warn!(error = %e, "Lookup failed on the store");
        }
        ApiError::NotFound(ServiceError::NotFound.to_string())
    }

    /// List and delete.
    pub fn from_bulk(error: ServiceError) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Empresa API internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
