//! Record Store contract for empresa records.
//!
//! The store alone enforces CNPJ uniqueness; callers detect duplicates
//! only through [`StoreError::DuplicateKey`]. Lookups by id go through
//! [`EmpresaId::key`](crate::entities::EmpresaId::key) so Get, Update and
//! Delete resolve ids the same way.

pub mod memory;
pub mod mongo;

use crate::entities::{Empresa, EmpresaFields, EmpresaId};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryEmpresaStore;
pub use mongo::{MongoEmpresaStore, MongoStoreConfig};

/// Bound for single-record operations.
pub const POINT_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound for listing the whole collection.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StoreError {
    /// The unique index on `cnpj` rejected the write.
    #[error("cnpj já cadastrado")]
    DuplicateKey,

    #[error("não encontrado")]
    NotFound,

    #[error("store operation `{0}` timed out")]
    Timeout(&'static str),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

#[async_trait]
pub trait EmpresaStore: Send + Sync {
    /// Insert a new record and return the id the store assigned.
    async fn create(&self, fields: EmpresaFields) -> Result<EmpresaId, StoreError>;

    async fn get(&self, id: &EmpresaId) -> Result<Empresa, StoreError>;

    async fn get_by_cnpj(&self, cnpj: &str) -> Result<Empresa, StoreError>;

    /// All records in store iteration order. Zero records is not an error.
    async fn list(&self) -> Result<Vec<Empresa>, StoreError>;

    /// Replace every mutable field of the matching record. Matching nothing
    /// is not an error.
    async fn update(&self, id: &EmpresaId, fields: EmpresaFields) -> Result<(), StoreError>;

    /// Delete the matching record. Matching nothing is not an error.
    async fn delete(&self, id: &EmpresaId) -> Result<(), StoreError>;
}

/// Run `fut` under `limit`, reporting expiry as [`StoreError::Timeout`].
pub(crate) async fn bounded<T, F>(
    op: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(op)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_reports_stalled_operation() {
        let result: Result<(), StoreError> =
            bounded("get", POINT_TIMEOUT, std::future::pending()).await;
        assert!(matches!(result, Err(StoreError::Timeout("get"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_passes_through_result_within_limit() {
        let result = bounded("list", LIST_TIMEOUT, async {
            tokio::time::sleep(POINT_TIMEOUT).await;
            Ok(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);

        let result: Result<(), StoreError> =
            bounded("get", POINT_TIMEOUT, async { Err(StoreError::NotFound) }).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
