//! Backend HTTP client.
//!
//! Tables live at `{api}/dataset/{dataset}/table/{table}`; GET returns the
//! backend's read layout, PUT takes the [`BackendDocument`] layout.

use std::time::Duration;

use serde_json::Value;

use semtab_enrich::{HttpClient, HttpResponse, ServiceGateway, TableStore, TokenProvider, TransportError};
use semtab_model::TableModel;
use semtab_protocol::{from_backend_document, BackendDocument, ServiceInfo, ServiceParameters};

use crate::auth::{load_auth, AuthCredentials};
use crate::error::ClientError;
use crate::http::ReqwestHttp;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Which service catalogue to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Reconciliator,
    Extender,
}

/// Backend API client (blocking).
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: ReqwestHttp,
    api_base: String,
    creds: AuthCredentials,
}

impl BackendClient {
    /// Create a client from saved auth credentials.
    pub fn from_saved_auth() -> Result<Self, ClientError> {
        let creds = load_auth().ok_or(ClientError::NotAuthenticated)?;
        Self::new(creds, DEFAULT_TIMEOUT)
    }

    pub fn new(creds: AuthCredentials, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            http: ReqwestHttp::new(timeout)?,
            api_base: creds.api_base.trim_end_matches('/').to_string(),
            creds,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Reconciliation and extension calls through this client's transport.
    pub fn services(&self) -> ServiceGateway<'_> {
        ServiceGateway::new(self.api_base.clone(), &self.http, &self.creds)
    }

    /// Fetch and parse a table.
    pub fn get_table(&self, dataset_id: &str, table_id: &str) -> Result<TableModel, ClientError> {
        let raw = self.send_get(&self.table_url(dataset_id, table_id))?;
        from_backend_document(&raw).map_err(|e| ClientError::Parse(e.to_string()))
    }

    pub fn put_table_document(
        &self,
        dataset_id: &str,
        table_id: &str,
        doc: &BackendDocument,
    ) -> Result<(), ClientError> {
        let body = serde_json::to_value(doc).map_err(|e| ClientError::Parse(e.to_string()))?;
        self.send_put(&self.table_url(dataset_id, table_id), &body)?;
        tracing::info!(dataset_id, table_id, "table saved");
        Ok(())
    }

    pub fn list_reconciliators(&self) -> Result<Vec<ServiceInfo>, ClientError> {
        let json = self.send_get(&format!("{}/reconciliators/list", self.api_base))?;
        Ok(service_list(&json))
    }

    pub fn list_extenders(&self) -> Result<Vec<ServiceInfo>, ClientError> {
        let json = self.send_get(&format!("{}/extenders/list", self.api_base))?;
        Ok(service_list(&json))
    }

    /// Form fields of one catalogue entry, split into mandatory and optional.
    pub fn service_parameters(&self, kind: ServiceKind, service_id: &str) -> Result<ServiceParameters, ClientError> {
        let services = match kind {
            ServiceKind::Reconciliator => self.list_reconciliators()?,
            ServiceKind::Extender => self.list_extenders()?,
        };
        let info = services
            .iter()
            .find(|s| s.id == service_id)
            .ok_or_else(|| ClientError::UnknownService(service_id.to_string()))?;
        Ok(ServiceParameters::from_info(info))
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn table_url(&self, dataset_id: &str, table_id: &str) -> String {
        format!("{}/dataset/{}/table/{}", self.api_base, dataset_id, table_id)
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(auth) = self.creds.auth_header() {
            headers.push(("Authorization".to_string(), auth));
        }
        headers
    }

    fn send_get(&self, url: &str) -> Result<Value, ClientError> {
        tracing::debug!(%url, "GET");
        let response = self.http.get(url, &self.headers())?;
        check(response)
    }

    fn send_put(&self, url: &str, body: &Value) -> Result<Value, ClientError> {
        tracing::debug!(%url, "PUT");
        let response = self.http.put(url, &self.headers(), body)?;
        check(response)
    }
}

impl TableStore for BackendClient {
    fn get_raw_table(&self, dataset_id: &str, table_id: &str) -> Result<Value, TransportError> {
        Ok(self.send_get(&self.table_url(dataset_id, table_id))?)
    }

    fn put_table(&self, dataset_id: &str, table_id: &str, doc: &BackendDocument) -> Result<(), TransportError> {
        Ok(self.put_table_document(dataset_id, table_id, doc)?)
    }
}

fn check(response: HttpResponse) -> Result<Value, ClientError> {
    if response.is_success() {
        return Ok(response.json);
    }
    let message = response
        .json
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| response.json.to_string());
    Err(ClientError::Http(response.status, message))
}

fn service_list(json: &Value) -> Vec<ServiceInfo> {
    let Some(entries) = json.as_array() else {
        tracing::warn!("service list is not an array");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<ServiceInfo>(entry.clone()) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed service entry");
                None
            }
        })
        .collect()
}
