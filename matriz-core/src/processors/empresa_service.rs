use crate::entities::{Empresa, EmpresaFields, EmpresaId};
use crate::events::{EmpresaEvent, Notifier};
use crate::store::{EmpresaStore, StoreError};
use crate::validation::{ValidationError, validate_cnpj};
use kanau::processor::Processor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The new CNPJ is already taken by another record.
    #[error("cnpj já cadastrado")]
    Conflict,

    #[error("não encontrado")]
    NotFound,

    /// The store failed or timed out.
    #[error(transparent)]
    Dependency(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey => ServiceError::Conflict,
            StoreError::NotFound => ServiceError::NotFound,
            other => ServiceError::Dependency(other),
        }
    }
}

/// The CRUD service. Cheap to share: the store and publisher are both
/// safe for concurrent use.
#[derive(Clone)]
pub struct EmpresaService {
    store: Arc<dyn EmpresaStore>,
    notifier: Notifier,
}

impl EmpresaService {
    pub fn new(store: Arc<dyn EmpresaStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    async fn notify(&self, event: EmpresaEvent) {
        let outcome = self.notifier.notify(&event).await;
        debug!(?outcome, %event, "Notification attempted");
    }
}

#[derive(Debug, Clone)]
pub struct CreateEmpresa {
    pub fields: EmpresaFields,
}

#[derive(Debug, Clone)]
pub struct GetEmpresa {
    pub id: EmpresaId,
}

#[derive(Debug, Clone, Copy)]
pub struct ListEmpresas;

#[derive(Debug, Clone)]
pub struct UpdateEmpresa {
    pub id: EmpresaId,
    pub fields: EmpresaFields,
}

#[derive(Debug, Clone)]
pub struct DeleteEmpresa {
    pub id: EmpresaId,
}

impl Processor<CreateEmpresa> for EmpresaService {
    type Output = EmpresaId;
    type Error = ServiceError;
    #[tracing::instrument(skip_all, err, name = "Service:CreateEmpresa")]
    async fn process(&self, cmd: CreateEmpresa) -> Result<EmpresaId, ServiceError> {
        validate_cnpj(&cmd.fields.cnpj)?;
        let nome_fantasia = cmd.fields.nome_fantasia.clone();
        let id = self.store.create(cmd.fields).await?;
        self.notify(EmpresaEvent::Created { nome_fantasia }).await;
        Ok(id)
    }
}

impl Processor<GetEmpresa> for EmpresaService {
    type Output = Empresa;
    type Error = ServiceError;
    async fn process(&self, query: GetEmpresa) -> Result<Empresa, ServiceError> {
        Ok(self.store.get(&query.id).await?)
    }
}

impl Processor<ListEmpresas> for EmpresaService {
    type Output = Vec<Empresa>;
    type Error = ServiceError;
    async fn process(&self, _query: ListEmpresas) -> Result<Vec<Empresa>, ServiceError> {
        Ok(self.store.list().await?)
    }
}

impl Processor<UpdateEmpresa> for EmpresaService {
    type Output = ();
    type Error = ServiceError;
    #[tracing::instrument(skip_all, fields(id = %cmd.id), err, name = "Service:UpdateEmpresa")]
    async fn process(&self, cmd: UpdateEmpresa) -> Result<(), ServiceError> {
        validate_cnpj(&cmd.fields.cnpj)?;
        let nome_fantasia = cmd.fields.nome_fantasia.clone();
        self.store.update(&cmd.id, cmd.fields).await?;
        self.notify(EmpresaEvent::Updated { nome_fantasia }).await;
        Ok(())
    }
}

impl Processor<DeleteEmpresa> for EmpresaService {
    type Output = ();
    type Error = ServiceError;
    #[tracing::instrument(skip_all, fields(id = %cmd.id), err, name = "Service:DeleteEmpresa")]
    async fn process(&self, cmd: DeleteEmpresa) -> Result<(), ServiceError> {
        // Only needed for the notification text; failure must not block
        // the delete.
        let previous = match self.store.get(&cmd.id).await {
            Ok(empresa) => Some(empresa),
            Err(StoreError::NotFound) => None,
            Err(e) => {
                warn!(error = %e, "Lookup before delete failed");
                None
            }
        };
        self.store
            .delete(&cmd.id)
            .await
            .map_err(ServiceError::Dependency)?;
        self.notify(EmpresaEvent::deleted(previous.as_ref())).await;
        Ok(())
    }
}
