//! Empresa CRUD endpoints.
//!
//! Routes (nested under `/api`):
//! - `POST   /empresas` - Create an empresa from a form body
//! - `GET    /empresas` - List all empresas
//! - `GET    /empresas/{id}` - Fetch a single empresa
//! - `PUT    /empresas/{id}` - Replace every field of an empresa
//! - `DELETE /empresas/{id}` - Remove an empresa

use super::error::ApiError;
use super::form::EmpresaFormBody;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kanau::processor::Processor;
use matriz_core::entities::{Empresa, EmpresaFields, EmpresaId};
use matriz_core::processors::{
    CreateEmpresa, DeleteEmpresa, GetEmpresa, ListEmpresas, UpdateEmpresa,
};
use matriz_sdk::objects::{CreatedResponse, EmpresaForm, EmpresaResponse, StatusResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/empresas", post(create_empresa).get(list_empresas))
        .route(
            "/empresas/{id}",
            get(get_empresa).put(update_empresa).delete(delete_empresa),
        )
}

async fn create_empresa(
    State(state): State<AppState>,
    EmpresaFormBody(form): EmpresaFormBody,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state
        .service
        .process(CreateEmpresa {
            fields: to_fields(form),
        })
        .await
        .map_err(ApiError::from_write)?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse { id: id.to_string() }),
    ))
}

async fn list_empresas(
    State(state): State<AppState>,
) -> Result<Json<Vec<EmpresaResponse>>, ApiError> {
    let empresas = state
        .service
        .process(ListEmpresas)
        .await
        .map_err(ApiError::from_bulk)?;
    Ok(Json(empresas.iter().map(to_response).collect()))
}

async fn get_empresa(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EmpresaResponse>, ApiError> {
    let empresa = state
        .service
        .process(GetEmpresa {
            id: EmpresaId::new(id),
        })
        .await
        .map_err(ApiError::from_read)?;
    Ok(Json(to_response(&empresa)))
}

async fn update_empresa(
    State(state): State<AppState>,
    Path(id): Path<String>,
    EmpresaFormBody(form): EmpresaFormBody,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .service
        .process(UpdateEmpresa {
            id: EmpresaId::new(id),
            fields: to_fields(form),
        })
        .await
        .map_err(ApiError::from_write)?;
    Ok(Json(StatusResponse::ok()))
}

async fn delete_empresa(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .service
        .process(DeleteEmpresa {
            id: EmpresaId::new(id),
        })
        .await
        .map_err(ApiError::from_bulk)?;
    Ok(Json(StatusResponse::ok()))
}

fn to_fields(form: EmpresaForm) -> EmpresaFields {
    EmpresaFields {
        cnpj: form.cnpj,
        nome_fantasia: form.nome_fantasia,
        razao_social: form.razao_social,
        endereco: form.endereco,
        num_funcionarios: form.num_funcionarios,
        num_min_pcd: form.num_min_pcd,
    }
}

fn to_response(empresa: &Empresa) -> EmpresaResponse {
    let fields = &empresa.fields;
    EmpresaResponse {
        id: empresa.id.to_string(),
        cnpj: fields.cnpj.clone(),
        nome_fantasia: fields.nome_fantasia.clone(),
        razao_social: fields.razao_social.clone(),
        endereco: fields.endereco.clone(),
        num_funcionarios: fields.num_funcionarios,
        num_min_pcd: fields.num_min_pcd,
    }
}
