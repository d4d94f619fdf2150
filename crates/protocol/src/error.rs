use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Document is missing a required key or has the wrong shape.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// Document text is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }
}
