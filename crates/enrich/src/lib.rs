//! `semtab-enrich`: reconciliation and extension engines.
//!
//! Merges annotation-service responses into a [`TableModel`](semtab_model::TableModel)
//! while keeping its aggregates consistent. Service ids are resolved once
//! through the [`ServiceRegistry`]; engines only see strategy tags.
//!
//! No HTTP here: transport, auth and storage come in through the traits in
//! [`collab`].

pub mod collab;
pub mod config;
pub mod error;
pub mod extend;
pub mod pipeline;
pub mod reconcile;

pub use collab::{
    ExtensionService, HttpClient, HttpResponse, ReconciliationService, ServiceGateway, TableStore, TokenProvider,
    TransportError,
};
pub use config::{
    Extender, ExtenderKind, ExtenderSpec, ExtensionParam, Reconciler, ReconcilerKind, ReconcilerSpec,
    ServiceRegistry,
};
pub use error::{EnrichError, RowWarning, ValidationError, WarningReason};
pub use extend::{
    apply_extension_response, build_extension_request, derive_from_reconciled, derived_column_id, extend_column,
    DecimalFormat, ExtensionOptions, ExtensionOutcome, ExtensionPlan, MissingCellPolicy,
};
pub use pipeline::{EnrichmentPipeline, ExtendStep, PipelineReport, ReconcileStep};
pub use reconcile::{
    apply_reconciliation, build_reconciliation_request, parse_reconciliation_response, reconcile,
    ReconcileOutcome,
};
