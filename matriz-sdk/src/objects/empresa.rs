use serde::{Deserialize, Serialize};

/// A company record as returned by `GET /api/empresas[/{id}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmpresaResponse {
    pub id: String,
    pub cnpj: String,
    pub nome_fantasia: String,
    pub razao_social: String,
    pub endereco: String,
    pub num_funcionarios: u32,
    pub num_min_pcd: u32,
}

/// Form fields accepted by `POST /api/empresas` and `PUT /api/empresas/{id}`.
///
/// Sent as `application/x-www-form-urlencoded` or `multipart/form-data`.
/// Every field is replaced on update, so omitted fields become empty or 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmpresaForm {
    pub cnpj: String,
    pub nome_fantasia: String,
    pub razao_social: String,
    pub endereco: String,
    pub num_funcionarios: u32,
    pub num_min_pcd: u32,
}
