//! CRUD API client.

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::EMPRESAS_PATH;
use crate::objects::{CreatedResponse, EmpresaForm, EmpresaResponse, StatusResponse};

/// Typed HTTP client for the empresa CRUD API.
///
/// Bodies are sent URL-encoded, matching what HTML forms submit.
#[derive(Debug, Clone)]
pub struct EmpresaClient {
    http: Client,
    base_url: Url,
}

impl EmpresaClient {
    /// * `base_url` – root URL of the API server (e.g. `http://localhost:8080`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    fn item_url(&self, id: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(&format!("{EMPRESAS_PATH}/{id}"))?)
    }

    /// `POST /api/empresas` – returns the new record's id.
    pub async fn create(&self, form: &EmpresaForm) -> Result<String, ClientError> {
        let url = self.base_url.join(EMPRESAS_PATH)?;
        let resp = self.http.post(url).form(form).send().await?;
        let created: CreatedResponse = parse_response(resp).await?;
        Ok(created.id)
    }

    /// `GET /api/empresas`
    pub async fn list(&self) -> Result<Vec<EmpresaResponse>, ClientError> {
        let url = self.base_url.join(EMPRESAS_PATH)?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/empresas/{id}`
    pub async fn get(&self, id: &str) -> Result<EmpresaResponse, ClientError> {
        let resp = self.http.get(self.item_url(id)?).send().await?;
        parse_response(resp).await
    }

    /// `PUT /api/empresas/{id}` – replaces every field.
    pub async fn update(&self, id: &str, form: &EmpresaForm) -> Result<(), ClientError> {
        let resp = self.http.put(self.item_url(id)?).form(form).send().await?;
        let _: StatusResponse = parse_response(resp).await?;
        Ok(())
    }

    /// `DELETE /api/empresas/{id}` – succeeds for unknown ids too.
    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let resp = self.http.delete(self.item_url(id)?).send().await?;
        let _: StatusResponse = parse_response(resp).await?;
        Ok(())
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
