//! Blocking reqwest transport (no Tokio runtime required).

use std::time::Duration;

use serde_json::Value;

use semtab_enrich::collab::Headers;
use semtab_enrich::{HttpClient, HttpResponse, TransportError};

use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    inner: reqwest::blocking::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let inner = reqwest::blocking::Client::builder()
            .user_agent(format!("semtab/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { inner })
    }

    fn send(&self, mut req: reqwest::blocking::RequestBuilder, headers: &Headers) -> Result<HttpResponse, TransportError> {
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let response = req.send().map_err(|e| TransportError::network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|e| TransportError::network(e.to_string()))?;
        // Error pages are often HTML; keep the status and drop the body.
        let json = serde_json::from_str(&text).unwrap_or(Value::Null);
        tracing::trace!(status, bytes = text.len(), "response received");
        Ok(HttpResponse { status, json })
    }
}

impl HttpClient for ReqwestHttp {
    fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse, TransportError> {
        self.send(self.inner.get(url), headers)
    }

    fn post(&self, url: &str, headers: &Headers, body: &Value) -> Result<HttpResponse, TransportError> {
        self.send(self.inner.post(url).json(body), headers)
    }

    fn put(&self, url: &str, headers: &Headers, body: &Value) -> Result<HttpResponse, TransportError> {
        self.send(self.inner.put(url).json(body), headers)
    }
}
