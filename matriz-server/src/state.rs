//! Application state shared across request handlers.

use axum::http::HeaderValue;
use matriz_core::hub::HubHandle;
use matriz_core::processors::EmpresaService;
use std::sync::Arc;

/// State of the CRUD API server.
///
/// Cloneable and cheap to pass around; the service shares its store and
/// publisher behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub service: EmpresaService,
}

impl AppState {
    pub fn new(service: EmpresaService) -> Self {
        Self { service }
    }
}

/// State of the events server.
#[derive(Clone)]
pub struct EventsState {
    pub hub: HubHandle,
    /// Empty means any origin may connect.
    pub allowed_origins: Arc<[String]>,
}

impl EventsState {
    pub fn new(hub: HubHandle, allowed_origins: Vec<String>) -> Self {
        Self {
            hub,
            allowed_origins: allowed_origins.into(),
        }
    }

    /// Requests without an `Origin` header come from non-browser clients
    /// and are let through.
    pub fn origin_allowed(&self, origin: Option<&HeaderValue>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        let Some(origin) = origin else {
            return true;
        };
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        let origin = origin.trim_end_matches('/');
        self.allowed_origins
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(origin))
    }
}
