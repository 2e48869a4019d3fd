//! Hosted Backend Client
//!
//! Row store and blob store over the hosted database's REST dialect
//! (`/rest/v1/{table}` with `col=eq.v`, `col=in.(..)`, `order=col.asc`)
//! and its object storage (`/storage/v1/object/{bucket}/{path}`).

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

use super::traits::{BlobStore, Filter, Query, RowStore, UploadOptions};
use crate::domain::{DomainError, DomainResult, Row, Session, Table};

/// Characters escaped inside one storage path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Shared connection to the hosted backend.
///
/// Cheap to clone; the auth provider and the stores share one session slot,
/// so requests made after sign-in carry the user's access token.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: watch::Sender<Option<Session>>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str) -> DomainResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(DomainError::InvalidInput(format!("Invalid backend url: {}", base_url)));
        }
        if anon_key.trim().is_empty() {
            return Err(DomainError::InvalidInput("Backend API key is required".into()));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DomainError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        let (session, _) = watch::channel(None);
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                anon_key: anon_key.trim().to_string(),
                session,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub(crate) fn session(&self) -> &watch::Sender<Option<Session>> {
        &self.inner.session
    }

    /// Attach the API key and the current bearer token
    pub(crate) fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .inner
            .session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.inner.anon_key.clone());
        request
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(token)
    }

    /// Request with only the API key, for auth endpoints
    pub(crate) fn anonymous(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.inner.anon_key)
    }
}

/// Render a filter as a `(column, operator.value)` query pair
pub(crate) fn filter_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(column, Value::Null) => (column.clone(), "is.null".to_string()),
        Filter::Eq(column, value) => (column.clone(), format!("eq.{}", scalar(value))),
        Filter::In(column, values) => {
            let items: Vec<String> = values.iter().map(quoted).collect();
            (column.clone(), format!("in.({})", items.join(",")))
        }
    }
}

/// Query pairs for a select
pub(crate) fn select_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(query.filters.iter().map(filter_param));
    if let Some(column) = &query.order_by {
        params.push(("order".to_string(), format!("{}.asc", column)));
    }
    params
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Membership values are double-quoted so commas and parens survive
fn quoted(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        other => other.to_string(),
    }
}

/// Storage object path with each segment escaped
pub(crate) fn object_path(bucket: &str, path: &str) -> String {
    let segments: Vec<String> = std::iter::once(bucket)
        .chain(path.split('/'))
        .filter(|s| !s.is_empty())
        .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string())
        .collect();
    format!("/storage/v1/object/{}", segments.join("/"))
}

/// Map a transport failure to a backend error with a hint
pub(crate) fn request_error(e: reqwest::Error, what: &str) -> DomainError {
    if e.is_timeout() {
        DomainError::Backend(format!("{}: timeout - request took too long", what))
    } else if e.is_connect() {
        DomainError::Backend(format!("{}: connection error - check network connectivity. Error: {}", what, e))
    } else if e.is_decode() {
        DomainError::Backend(format!("{}: unexpected response format. Error: {}", what, e))
    } else {
        DomainError::Backend(format!("{}: {}", what, e))
    }
}

/// Map an error response body to a domain error
pub(crate) fn status_error(status: StatusCode, body: &str, what: &str) -> DomainError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DomainError::Auth(format!("{}: {}", what, message))
        }
        StatusCode::CONFLICT => DomainError::Conflict(format!("{}: {}", what, message)),
        StatusCode::NOT_FOUND => DomainError::NotFound(format!("{}: {}", what, message)),
        _ => DomainError::Backend(format!("HTTP {} from {}: {}", status.as_u16(), what, message)),
    }
}

/// Read the body, turning non-2xx statuses into errors
pub(crate) async fn handle_response(response: reqwest::Response, what: &str) -> DomainResult<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| request_error(e, what))?;
    if !status.is_success() {
        return Err(status_error(status, &body, what));
    }
    Ok(body)
}

fn parse_rows(body: &str) -> DomainResult<Vec<Row>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(body)?)
}

#[async_trait]
impl RowStore for SupabaseClient {
    async fn insert(&self, table: Table, rows: Vec<Row>) -> DomainResult<Vec<Row>> {
        let what = format!("insert into {}", table);
        let request = self
            .http()
            .post(self.url(&format!("/rest/v1/{}", table)))
            .header("Prefer", "return=representation")
            .json(&rows);
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| request_error(e, &what))?;
        parse_rows(&handle_response(response, &what).await?)
    }

    async fn select(&self, table: Table, query: &Query) -> DomainResult<Vec<Row>> {
        let what = format!("select from {}", table);
        let request = self
            .http()
            .get(self.url(&format!("/rest/v1/{}", table)))
            .query(&select_params(query));
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| request_error(e, &what))?;
        parse_rows(&handle_response(response, &what).await?)
    }

    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> DomainResult<()> {
        if patch.is_empty() {
            return Err(DomainError::InvalidInput("Empty update".into()));
        }
        if filters.is_empty() {
            return Err(DomainError::InvalidInput(format!("Refusing unfiltered update of {}", table)));
        }
        let what = format!("update {}", table);
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let request = self
            .http()
            .patch(self.url(&format!("/rest/v1/{}", table)))
            .query(&params)
            .header("Prefer", "return=minimal")
            .json(&patch);
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| request_error(e, &what))?;
        handle_response(response, &what).await?;
        Ok(())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> DomainResult<()> {
        if filters.is_empty() {
            return Err(DomainError::InvalidInput(format!("Refusing unfiltered delete of {}", table)));
        }
        let what = format!("delete from {}", table);
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let request = self
            .http()
            .delete(self.url(&format!("/rest/v1/{}", table)))
            .query(&params);
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| request_error(e, &what))?;
        handle_response(response, &what).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        blob: Vec<u8>,
        options: UploadOptions,
    ) -> DomainResult<String> {
        let what = format!("upload {}/{}", bucket, path);
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let request = self
            .http()
            .post(self.url(&object_path(bucket, path)))
            .header("cache-control", format!("max-age={}", options.cache_control))
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .header("content-type", mime.as_ref())
            .body(blob);
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| request_error(e, &what))?;
        let body = handle_response(response, &what).await?;

        let key = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("Key").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("{}/{}", bucket, path));
        Ok(key)
    }
}
