//! Wire objects and clients for the matriz empresa service.
//!
//! The HTTP client and live event stream are behind the `client` feature.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;

/// Collection route of the CRUD API.
pub const EMPRESAS_PATH: &str = "/api/empresas";

/// Route of the live event stream on the events server.
pub const EVENTS_PATH: &str = "/ws/events";
