//! In-process [`EmpresaStore`] used by tests and local runs without MongoDB.
//!
//! Mirrors the Mongo contract: ids are assigned as native object ids,
//! `cnpj` is unique, and Update/Delete that match nothing succeed.

use super::{EmpresaStore, StoreError};
use crate::entities::{Empresa, EmpresaFields, EmpresaId, EmpresaKey};
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryEmpresaStore {
    records: RwLock<Vec<(EmpresaKey, EmpresaFields)>>,
}

impl MemoryEmpresaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under an explicit key, bypassing id assignment.
    ///
    /// Used to seed records whose `_id` is a plain string.
    pub async fn insert_with_key(
        &self,
        key: EmpresaKey,
        fields: EmpresaFields,
    ) -> Result<EmpresaId, StoreError> {
        let mut records = self.records.write().await;
        if records.iter().any(|(_, f)| f.cnpj == fields.cnpj) {
            return Err(StoreError::DuplicateKey);
        }
        records.push((key.clone(), fields));
        Ok(key.into())
    }
}

fn to_entity(key: &EmpresaKey, fields: &EmpresaFields) -> Empresa {
    Empresa::new(key.clone().into(), fields.clone())
}

#[async_trait]
impl EmpresaStore for MemoryEmpresaStore {
    async fn create(&self, fields: EmpresaFields) -> Result<EmpresaId, StoreError> {
        self.insert_with_key(EmpresaKey::Native(ObjectId::new()), fields)
            .await
    }

    async fn get(&self, id: &EmpresaId) -> Result<Empresa, StoreError> {
        let key = id.key();
        let records = self.records.read().await;
        records
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(k, f)| to_entity(k, f))
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_cnpj(&self, cnpj: &str) -> Result<Empresa, StoreError> {
        let records = self.records.read().await;
        records
            .iter()
            .find(|(_, f)| f.cnpj == cnpj)
            .map(|(k, f)| to_entity(k, f))
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self) -> Result<Vec<Empresa>, StoreError> {
        let records = self.records.read().await;
        Ok(records.iter().map(|(k, f)| to_entity(k, f)).collect())
    }

    async fn update(&self, id: &EmpresaId, fields: EmpresaFields) -> Result<(), StoreError> {
        let key = id.key();
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|(k, f)| *k != key && f.cnpj == fields.cnpj)
        {
            return Err(StoreError::DuplicateKey);
        }
        if let Some((_, existing)) = records.iter_mut().find(|(k, _)| *k == key) {
            *existing = fields;
        }
        Ok(())
    }

    async fn delete(&self, id: &EmpresaId) -> Result<(), StoreError> {
        let key = id.key();
        self.records.write().await.retain(|(k, _)| *k != key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fields(cnpj: &str, nome: &str) -> EmpresaFields {
        EmpresaFields {
            cnpj: cnpj.to_string(),
            nome_fantasia: nome.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_distinct_native_ids() {
        let store = MemoryEmpresaStore::new();
        let a = store.create(fields("1", "A")).await.unwrap();
        let b = store.create(fields("2", "B")).await.unwrap();
        assert_ne!(a, b);
        assert!(matches!(a.key(), EmpresaKey::Native(_)));
        assert_eq!(store.get(&a).await.unwrap().fields.nome_fantasia, "A");
        assert_eq!(store.get_by_cnpj("2").await.unwrap().id, b);
    }

    #[tokio::test]
    async fn test_duplicate_cnpj_rejected() {
        let store = MemoryEmpresaStore::new();
        store.create(fields("1", "A")).await.unwrap();
        assert!(matches!(
            store.create(fields("1", "B")).await,
            Err(StoreError::DuplicateKey)
        ));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_creates_yield_one_success() {
        let store = Arc::new(MemoryEmpresaStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.create(fields("999", &format!("E{i}"))).await })
            })
            .collect();

        let mut ok = 0;
        let mut dup = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::DuplicateKey) => dup += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, dup), (1, 7));
    }

    #[tokio::test]
    async fn test_string_ids_are_matched_raw() {
        let store = MemoryEmpresaStore::new();
        let id = store
            .insert_with_key(EmpresaKey::Raw("legacy".into()), fields("1", "Old"))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "legacy");
        assert_eq!(store.get(&id).await.unwrap().fields.nome_fantasia, "Old");

        store.update(&id, fields("1", "New")).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().fields.nome_fantasia, "New");

        store.delete(&id).await.unwrap();
        assert!(matches!(store.get(&id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_and_delete_of_missing_id_succeed() {
        let store = MemoryEmpresaStore::new();
        let missing = EmpresaId::from(ObjectId::new());
        store.update(&missing, fields("1", "X")).await.unwrap();
        store.delete(&missing).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(store.get(&missing).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_to_taken_cnpj_is_duplicate() {
        let store = MemoryEmpresaStore::new();
        store.create(fields("1", "A")).await.unwrap();
        let b = store.create(fields("2", "B")).await.unwrap();
        assert!(matches!(
            store.update(&b, fields("1", "B")).await,
            Err(StoreError::DuplicateKey)
        ));
        // keeping its own cnpj is fine
        store.update(&b, fields("2", "B2")).await.unwrap();
    }
}
