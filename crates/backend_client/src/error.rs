use thiserror::Error;

use semtab_enrich::TransportError;

/// Error type for backend operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No auth credentials configured
    #[error("not authenticated: no saved credentials")]
    NotAuthenticated,
    /// Request never got a response
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx response
    #[error("HTTP {0}: {1}")]
    Http(u16, String),
    /// Response body did not have the expected shape
    #[error("parse error: {0}")]
    Parse(String),
    #[error("I/O error: {0}")]
    Io(String),
    /// Catalogue has no entry with this id
    #[error("unknown service: {0}")]
    UnknownService(String),
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(status, body) => TransportError::status(status, body),
            other => TransportError::network(other.to_string()),
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err.status {
            Some(status) => ClientError::Http(status, err.message),
            None => ClientError::Network(err.message),
        }
    }
}
