//! MongoDB-backed [`EmpresaStore`].

use super::{EmpresaStore, LIST_TIMEOUT, POINT_TIMEOUT, StoreError, bounded};
use crate::entities::{Empresa, EmpresaFields, EmpresaId, EmpresaKey};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Bound for connecting and creating the index at startup.
const INIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct MongoStoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

/// On-disk shape of a record. `_id` is kept as raw BSON so both native
/// object ids and string ids decode.
#[derive(Debug, Serialize, Deserialize)]
struct EmpresaDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<Bson>,
    cnpj: String,
    #[serde(default)]
    nome_fantasia: String,
    #[serde(default)]
    razao_social: String,
    #[serde(default)]
    endereco: String,
    #[serde(default)]
    num_funcionarios: i64,
    #[serde(default)]
    num_min_pcd: i64,
}

impl From<EmpresaFields> for EmpresaDocument {
    fn from(fields: EmpresaFields) -> Self {
        Self {
            id: None,
            cnpj: fields.cnpj,
            nome_fantasia: fields.nome_fantasia,
            razao_social: fields.razao_social,
            endereco: fields.endereco,
            num_funcionarios: i64::from(fields.num_funcionarios),
            num_min_pcd: i64::from(fields.num_min_pcd),
        }
    }
}

impl EmpresaDocument {
    fn into_entity(self) -> Empresa {
        let id = match self.id {
            Some(Bson::ObjectId(oid)) => EmpresaId::from(oid),
            Some(Bson::String(s)) => EmpresaId::new(s),
            Some(other) => EmpresaId::new(other.to_string()),
            None => EmpresaId::new(""),
        };
        Empresa::new(
            id,
            EmpresaFields {
                cnpj: self.cnpj,
                nome_fantasia: self.nome_fantasia,
                razao_social: self.razao_social,
                endereco: self.endereco,
                num_funcionarios: u32::try_from(self.num_funcionarios).unwrap_or_default(),
                num_min_pcd: u32::try_from(self.num_min_pcd).unwrap_or_default(),
            },
        )
    }
}

fn id_filter(id: &EmpresaId) -> Document {
    let key: Bson = id.key().into();
    doc! { "_id": key }
}

fn set_document(fields: EmpresaFields) -> Document {
    doc! {
        "$set": {
            "cnpj": fields.cnpj,
            "nome_fantasia": fields.nome_fantasia,
            "razao_social": fields.razao_social,
            "endereco": fields.endereco,
            "num_funcionarios": i64::from(fields.num_funcionarios),
            "num_min_pcd": i64::from(fields.num_min_pcd),
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn map_write_error(err: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&err) {
        StoreError::DuplicateKey
    } else {
        StoreError::Database(err)
    }
}

/// Record Store over a single MongoDB collection.
///
/// The driver's client is internally pooled, so one instance is shared by
/// every request without extra locking.
#[derive(Clone)]
pub struct MongoEmpresaStore {
    collection: Collection<EmpresaDocument>,
}

impl MongoEmpresaStore {
    /// Connect and make sure the unique index on `cnpj` exists.
    pub async fn connect(config: &MongoStoreConfig) -> Result<Self, StoreError> {
        bounded("connect", INIT_TIMEOUT, async {
            let client = Client::with_uri_str(&config.uri).await?;
            let collection = client
                .database(&config.database)
                .collection::<EmpresaDocument>(&config.collection);
            let store = Self { collection };
            store.ensure_indexes().await?;
            Ok(store)
        })
        .await
    }

    /// Re-creating an existing index with the same keys and options is a
    /// no-op on the server.
    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "cnpj": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let created = self.collection.create_index(index).await?;
        info!(index = %created.index_name, "Unique cnpj index ensured");
        Ok(())
    }
}

#[async_trait]
impl EmpresaStore for MongoEmpresaStore {
    #[tracing::instrument(skip_all, err, name = "Mongo:CreateEmpresa")]
    async fn create(&self, fields: EmpresaFields) -> Result<EmpresaId, StoreError> {
        bounded("create", POINT_TIMEOUT, async {
            let result = self
                .collection
                .insert_one(EmpresaDocument::from(fields))
                .await
                .map_err(map_write_error)?;
            Ok(match result.inserted_id {
                Bson::ObjectId(oid) => EmpresaId::from(oid),
                Bson::String(s) => EmpresaId::new(s),
                other => EmpresaId::new(other.to_string()),
            })
        })
        .await
    }

    #[tracing::instrument(skip(self), err, name = "Mongo:GetEmpresa")]
    async fn get(&self, id: &EmpresaId) -> Result<Empresa, StoreError> {
        bounded("get", POINT_TIMEOUT, async {
            self.collection
                .find_one(id_filter(id))
                .await?
                .map(EmpresaDocument::into_entity)
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    #[tracing::instrument(skip(self), err, name = "Mongo:GetEmpresaByCnpj")]
    async fn get_by_cnpj(&self, cnpj: &str) -> Result<Empresa, StoreError> {
        bounded("get_by_cnpj", POINT_TIMEOUT, async {
            self.collection
                .find_one(doc! { "cnpj": cnpj })
                .await?
                .map(EmpresaDocument::into_entity)
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    #[tracing::instrument(skip_all, err, name = "Mongo:ListEmpresas")]
    async fn list(&self) -> Result<Vec<Empresa>, StoreError> {
        bounded("list", LIST_TIMEOUT, async {
            let documents: Vec<EmpresaDocument> =
                self.collection.find(doc! {}).await?.try_collect().await?;
            Ok(documents
                .into_iter()
                .map(EmpresaDocument::into_entity)
                .collect())
        })
        .await
    }

    #[tracing::instrument(skip(self, fields), err, name = "Mongo:UpdateEmpresa")]
    async fn update(&self, id: &EmpresaId, fields: EmpresaFields) -> Result<(), StoreError> {
        bounded("update", POINT_TIMEOUT, async {
            self.collection
                .update_one(id_filter(id), set_document(fields))
                .await
                .map_err(map_write_error)?;
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self), err, name = "Mongo:DeleteEmpresa")]
    async fn delete(&self, id: &EmpresaId) -> Result<(), StoreError> {
        bounded("delete", POINT_TIMEOUT, async {
            self.collection.delete_one(id_filter(id)).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_id_filter_prefers_object_id() {
        let oid = ObjectId::new();
        let filter = id_filter(&EmpresaId::from(oid));
        assert_eq!(filter.get("_id"), Some(&Bson::ObjectId(oid)));

        let filter = id_filter(&EmpresaId::new("legacy-id"));
        assert_eq!(filter.get("_id"), Some(&Bson::String("legacy-id".into())));
    }

    #[test]
    fn test_set_document_replaces_every_field() {
        let update = set_document(EmpresaFields {
            cnpj: "1".into(),
            ..Default::default()
        });
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.len(), 6);
        assert_eq!(set.get_str("endereco").ok(), Some(""));
        assert!(!set.contains_key("_id"));
    }

    #[test]
    fn test_document_with_string_id_decodes() {
        let raw = doc! {
            "_id": "abc",
            "cnpj": "123",
            "nome_fantasia": "Loja",
            "num_funcionarios": 7_i32,
        };
        let document: EmpresaDocument = mongodb::bson::from_document(raw).unwrap();
        let empresa = document.into_entity();
        assert_eq!(empresa.id.as_str(), "abc");
        assert_eq!(empresa.fields.num_funcionarios, 7);
        assert_eq!(empresa.fields.endereco, "");
    }
}
