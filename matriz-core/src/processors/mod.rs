//! Processors orchestrating the empresa CRUD flows.
//!
//! Every mutation follows validate → persist → best-effort notify. The
//! notification outcome is dropped after logging; it never changes the
//! result of the persist step.

pub mod empresa_service;

pub use empresa_service::{
    CreateEmpresa, DeleteEmpresa, EmpresaService, GetEmpresa, ListEmpresas, ServiceError,
    UpdateEmpresa,
};
