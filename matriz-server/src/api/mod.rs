//! HTTP handlers.

pub mod empresas;
pub mod error;
pub mod events;
pub mod form;

use axum::Json;
use serde::Serialize;

pub use error::ApiError;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
