//! Form body extraction for empresa writes.
//!
//! Accepts `application/x-www-form-urlencoded` and `multipart/form-data`
//! bodies, merged with the query string. For a field given more than once
//! the first value wins. Urlencoded body values come before the query;
//! for multipart the query comes first. Without a `Content-Type` only the
//! query string is read.

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Bytes};
use matriz_sdk::objects::{EmpresaForm, ErrorResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormRejection {
    #[error("form inválido")]
    UnsupportedMediaType(String),

    #[error("form inválido")]
    UnreadableBody,
}

impl IntoResponse for FormRejection {
    fn into_response(self) -> Response {
        if let FormRejection::UnsupportedMediaType(media) = &self {
            tracing::debug!(%media, "Rejected form with unsupported content type");
        }
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(self.to_string())),
        )
            .into_response()
    }
}

/// Extracted empresa form, values trimmed and counts parsed.
#[derive(Debug)]
pub struct EmpresaFormBody(pub EmpresaForm);

impl<S> FromRequest<S> for EmpresaFormBody
where
    S: Send + Sync,
{
    type Rejection = FormRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let query = req.uri().query().map(str::to_owned);
        let mut values = FormValues::default();

        match media_type(req.headers()).as_deref() {
            None => values.extend_query(query.as_deref()),
            Some("application/x-www-form-urlencoded") => {
                let body = Bytes::from_request(req, state)
                    .await
                    .map_err(|_| FormRejection::UnreadableBody)?;
                values.extend_urlencoded(&body);
                values.extend_query(query.as_deref());
            }
            Some("multipart/form-data") => {
                values.extend_query(query.as_deref());
                match Multipart::from_request(req, state).await {
                    Ok(multipart) => read_multipart(multipart, &mut values).await,
                    Err(e) => tracing::debug!(error = %e, "Ignoring malformed multipart request"),
                }
            }
            Some(other) => return Err(FormRejection::UnsupportedMediaType(other.to_string())),
        }

        Ok(Self(values.into_form()))
    }
}

/// Lowercased media type without parameters, `None` when absent or unreadable.
fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let media = value.split(';').next()?.trim().to_ascii_lowercase();
    (!media.is_empty()).then_some(media)
}

/// Text fields are kept, file parts skipped. A malformed body keeps
/// whatever was read before the fault.
async fn read_multipart(mut multipart: Multipart, values: &mut FormValues) {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.file_name().is_some() {
                    continue;
                }
                let Some(name) = field.name().map(str::to_owned) else {
                    continue;
                };
                match field.text().await {
                    Ok(text) => values.push(name, text),
                    Err(e) => {
                        tracing::debug!(error = %e, "Multipart field unreadable");
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Multipart body malformed");
                break;
            }
        }
    }
}

#[derive(Debug, Default)]
struct FormValues {
    pairs: Vec<(String, String)>,
}

impl FormValues {
    fn push(&mut self, name: String, value: String) {
        self.pairs.push((name, value));
    }

    fn extend_urlencoded(&mut self, input: &[u8]) {
        self.pairs.extend(
            url::form_urlencoded::parse(input).map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
    }

    fn extend_query(&mut self, query: Option<&str>) {
        if let Some(query) = query {
            self.extend_urlencoded(query.as_bytes());
        }
    }

    /// First value for `name`, trimmed; empty when missing.
    fn text(&self, name: &str) -> String {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim().to_string())
            .unwrap_or_default()
    }

    fn into_form(self) -> EmpresaForm {
        EmpresaForm {
            cnpj: self.text("cnpj"),
            nome_fantasia: self.text("nome_fantasia"),
            razao_social: self.text("razao_social"),
            endereco: self.text("endereco"),
            num_funcionarios: parse_count(&self.text("num_funcionarios")),
            num_min_pcd: parse_count(&self.text("num_min_pcd")),
        }
    }
}

/// Non-negative count, 0 for anything that does not parse.
fn parse_count(value: &str) -> u32 {
    value.parse().unwrap_or(0)
}
