use std::fmt;

use serde::Serialize;
use thiserror::Error;

use semtab_model::ModelError;
use semtab_protocol::ProtocolError;

/// Caller mistakes caught before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported reconciliator: {0}")]
    UnsupportedReconciler(String),
    #[error("unsupported extender: {0}")]
    UnsupportedExtender(String),
    #[error("extender '{extender}' requires parameter '{parameter}'")]
    MissingParameter { extender: String, parameter: String },
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("column '{0}' is not reconciled")]
    NotReconciled(String),
    /// A derived column id is already taken by a column that extension did
    /// not produce.
    #[error("column '{0}' already exists and is not an extension column")]
    ColumnCollision(String),
    #[error("no properties requested")]
    NoProperties,
    #[error("invalid service registry: {0}")]
    InvalidRegistry(String),
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Structural problem in a service response; the call was aborted.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),
    /// Transport failure (`status` is `None`) or non-2xx response.
    #[error("remote service error: {message}")]
    RemoteService { status: Option<u16>, message: String },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl EnrichError {
    pub(crate) fn integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    /// Stable machine-readable error category.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::DataIntegrity(_) => "data_integrity",
            Self::RemoteService { .. } => "remote_service",
            Self::Model(ModelError::RowNotFound(_) | ModelError::ColumnNotFound(_)) => "not_found",
            Self::Model(_) => "data_integrity",
            Self::Protocol(_) => "malformed_document",
        }
    }
}

// ---------------------------------------------------------------------------
// Row-level warnings
// ---------------------------------------------------------------------------

/// Why a response item or row was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningReason {
    /// Item id has no `$` separator or an empty half.
    MalformedId,
    /// Item targets a different column than the one being reconciled.
    ColumnMismatch,
    UnknownRow,
    MissingCell,
    NoCandidates,
    NoCanonicalCandidate,
    MissingProperty,
}

impl fmt::Display for WarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MalformedId => "malformed item id",
            Self::ColumnMismatch => "item targets another column",
            Self::UnknownRow => "row not in table",
            Self::MissingCell => "row has no cell in column",
            Self::NoCandidates => "empty candidate list",
            Self::NoCanonicalCandidate => "no matched candidate",
            Self::MissingProperty => "property missing on canonical candidate",
        };
        f.write_str(s)
    }
}

/// A recoverable, skipped row. Also emitted through `tracing` at `warn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowWarning {
    /// Response item id or row id, as received.
    pub id: String,
    pub column: String,
    pub reason: WarningReason,
}

impl RowWarning {
    pub(crate) fn emit(id: impl Into<String>, column: impl Into<String>, reason: WarningReason) -> Self {
        let warning = Self {
            id: id.into(),
            column: column.into(),
            reason,
        };
        tracing::warn!(id = %warning.id, column = %warning.column, %reason, "skipping row");
        warning
    }
}

impl fmt::Display for RowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.id, self.column, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            EnrichError::from(ValidationError::UnsupportedReconciler("x".into())).category(),
            "validation"
        );
        assert_eq!(EnrichError::integrity("bad").category(), "data_integrity");
        assert_eq!(
            EnrichError::RemoteService {
                status: Some(502),
                message: "bad gateway".into()
            }
            .category(),
            "remote_service"
        );
        assert_eq!(
            EnrichError::from(ModelError::RowNotFound("r9".into())).category(),
            "not_found"
        );
        assert_eq!(
            EnrichError::from(ProtocolError::MalformedDocument("rows".into())).category(),
            "malformed_document"
        );
    }

    #[test]
    fn warning_display() {
        let w = RowWarning::emit("r1City", "City", WarningReason::MalformedId);
        assert_eq!(w.to_string(), "r1City [City]: malformed item id");
    }
}
