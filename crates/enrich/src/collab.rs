//! External collaborators: HTTP transport, auth, table storage.
//!
//! The engines themselves never do I/O. These traits are implemented by
//! `semtab-backend-client` for real use and by in-memory fakes in tests.

use serde_json::Value;
use thiserror::Error;

use semtab_protocol::{BackendDocument, ExtensionRequest, ReconciliationRequest};

use crate::error::EnrichError;

/// A completed HTTP exchange. Non-2xx statuses are still `Ok` at this layer.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed body; `Value::Null` for an empty or non-JSON body.
    pub json: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to complete an exchange, or a rejected one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<TransportError> for EnrichError {
    fn from(err: TransportError) -> Self {
        EnrichError::RemoteService {
            status: err.status,
            message: err.message,
        }
    }
}

pub type Headers = [(String, String)];

pub trait HttpClient {
    fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse, TransportError>;
    fn post(&self, url: &str, headers: &Headers, body: &Value) -> Result<HttpResponse, TransportError>;
    fn put(&self, url: &str, headers: &Headers, body: &Value) -> Result<HttpResponse, TransportError>;
}

pub trait TokenProvider {
    /// Full `Authorization` header value, or `None` for anonymous access.
    fn auth_header(&self) -> Option<String>;
}

/// Reads and writes one backend table.
pub trait TableStore {
    /// The table document exactly as the backend returns it.
    fn get_raw_table(&self, dataset_id: &str, table_id: &str) -> Result<Value, TransportError>;
    fn put_table(&self, dataset_id: &str, table_id: &str, doc: &BackendDocument) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// Annotation services
// ---------------------------------------------------------------------------

pub trait ReconciliationService {
    /// Raw service response; parsed by the reconciliation engine.
    fn reconcile(&self, reconciler_id: &str, request: &ReconciliationRequest) -> Result<Value, EnrichError>;
}

pub trait ExtensionService {
    /// Raw service response; parsed by the extension engine.
    fn extend(&self, extender_id: &str, request: &ExtensionRequest) -> Result<Value, EnrichError>;
}

/// Posts service requests through an [`HttpClient`] to
/// `{api_base}/reconciliators/{id}` and `{api_base}/extenders/{id}`.
pub struct ServiceGateway<'a> {
    api_base: String,
    http: &'a dyn HttpClient,
    token: &'a dyn TokenProvider,
}

impl<'a> ServiceGateway<'a> {
    pub fn new(api_base: impl Into<String>, http: &'a dyn HttpClient, token: &'a dyn TokenProvider) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http,
            token,
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(auth) = self.token.auth_header() {
            headers.push(("Authorization".to_string(), auth));
        }
        headers
    }

    fn post(&self, path: &str, body: Value) -> Result<Value, EnrichError> {
        let url = format!("{}/{path}", self.api_base);
        tracing::debug!(%url, "posting service request");
        let response = self.http.post(&url, &self.headers(), &body)?;
        if !response.is_success() {
            return Err(EnrichError::RemoteService {
                status: Some(response.status),
                message: error_message(&response.json),
            });
        }
        Ok(response.json)
    }
}

impl ReconciliationService for ServiceGateway<'_> {
    fn reconcile(&self, reconciler_id: &str, request: &ReconciliationRequest) -> Result<Value, EnrichError> {
        let body = serde_json::to_value(request).map_err(|e| EnrichError::integrity(e.to_string()))?;
        self.post(&format!("reconciliators/{reconciler_id}"), body)
    }
}

impl ExtensionService for ServiceGateway<'_> {
    fn extend(&self, extender_id: &str, request: &ExtensionRequest) -> Result<Value, EnrichError> {
        let body = serde_json::to_value(request).map_err(|e| EnrichError::integrity(e.to_string()))?;
        self.post(&format!("extenders/{extender_id}"), body)
    }
}

fn error_message(body: &Value) -> String {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}
