//! The company ("empresa") record and its identifier.
//!
//! Records created by the store carry a native object id, but records
//! inserted by other tools may use an arbitrary string `_id`. Every lookup
//! goes through [`EmpresaId::key`], which is the only place that decides
//! between the two encodings.

use mongodb::bson::Bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of an [`Empresa`] as seen by API callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmpresaId(String);

/// Storage-level key an [`EmpresaId`] resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EmpresaKey {
    Native(ObjectId),
    Raw(String),
}

impl EmpresaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the id: try the native object id encoding first, then fall
    /// back to the raw string.
    pub fn key(&self) -> EmpresaKey {
        match ObjectId::parse_str(&self.0) {
            Ok(oid) => EmpresaKey::Native(oid),
            Err(_) => EmpresaKey::Raw(self.0.clone()),
        }
    }
}

impl fmt::Display for EmpresaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ObjectId> for EmpresaId {
    fn from(oid: ObjectId) -> Self {
        Self(oid.to_hex())
    }
}

impl From<EmpresaKey> for EmpresaId {
    fn from(key: EmpresaKey) -> Self {
        match key {
            EmpresaKey::Native(oid) => oid.into(),
            EmpresaKey::Raw(s) => Self(s),
        }
    }
}

impl From<EmpresaKey> for Bson {
    fn from(key: EmpresaKey) -> Self {
        match key {
            EmpresaKey::Native(oid) => Bson::ObjectId(oid),
            EmpresaKey::Raw(s) => Bson::String(s),
        }
    }
}

/// The mutable part of a record. Create and Update both take a full set of
/// fields; Update replaces every one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmpresaFields {
    pub cnpj: String,
    pub nome_fantasia: String,
    pub razao_social: String,
    pub endereco: String,
    pub num_funcionarios: u32,
    pub num_min_pcd: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empresa {
    pub id: EmpresaId,
    #[serde(flatten)]
    pub fields: EmpresaFields,
}

impl Empresa {
    pub fn new(id: EmpresaId, fields: EmpresaFields) -> Self {
        Self { id, fields }
    }
}
