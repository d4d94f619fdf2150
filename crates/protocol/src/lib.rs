//! SemTab Backend Protocol
//!
//! Wire types exchanged with the table-annotation backend and with the
//! reconciliation / extension services, plus the payload composer that maps
//! a [`TableModel`](semtab_model::TableModel) to and from the backend's
//! table document.
//!
//! # Table document
//!
//! ```text
//! {
//!   "tableInstance": { id, idDataset, name, nCols, nRows, nCells,
//!                      nCellsReconciliated, lastModifiedDate,
//!                      minMetaScore, maxMetaScore },
//!   "columns": { "byId": { <columnId>: Column }, "allIds": [..] },
//!   "rows":    { "byId": { <rowId>: Row },       "allIds": [..] }
//! }
//! ```
//!
//! `allIds` always enumerates in creation order and `byId` keys follow it.
//!
//! # Usage
//!
//! ```ignore
//! use semtab_protocol::{from_backend_json, to_backend_payload};
//!
//! let table = from_backend_json(&body)?;
//! let doc = to_backend_payload(&table)?;
//! let json = serde_json::to_string(&doc)?;
//! ```

pub mod document;
pub mod error;
pub mod ordered;
pub mod services;

pub use document::{
    from_backend_document, from_backend_json, to_backend_payload, BackendDocument, Collection, TableInstance,
    WireRow,
};
pub use error::ProtocolError;
pub use ordered::OrderedMap;
pub use services::{
    ExtensionCell, ExtensionColumn, ExtensionRequest, ExtensionResponse, FormOption, FormParam,
    ReconciliationItem, ReconciliationRequest, ReconciliationResult, SecondaryValue, ServiceInfo,
    ServiceParameters,
};
