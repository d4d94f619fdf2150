//! End-to-end enrichment of one backend table.

use serde::Serialize;

use semtab_protocol::{from_backend_document, to_backend_payload, BackendDocument};

use crate::collab::{ExtensionService, ReconciliationService, TableStore};
use crate::config::{Extender, Reconciler, ServiceRegistry};
use crate::error::EnrichError;
use crate::extend::{run_extension, ExtensionOptions, ExtensionOutcome};
use crate::reconcile::{apply_reconciliation, build_reconciliation_request, parse_reconciliation_response, ReconcileOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileStep {
    pub column: String,
    pub reconciliator_id: String,
    /// Context columns for geocoding reconciliators.
    pub secondary_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendStep {
    pub column: String,
    pub extender_id: String,
    pub properties: Vec<String>,
    pub options: ExtensionOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub reconcile: Option<ReconcileOutcome>,
    pub extensions: Vec<ExtensionOutcome>,
    /// The document that was written back.
    #[serde(skip)]
    pub document: BackendDocument,
}

/// Table GET -> reconcile -> extend (0..n) -> table PUT.
///
/// Every service id is resolved before the first network call, so an
/// unsupported id fails without reading or writing the table.
pub struct EnrichmentPipeline<'a> {
    registry: &'a ServiceRegistry,
    store: &'a dyn TableStore,
    reconciliation: &'a dyn ReconciliationService,
    extension: &'a dyn ExtensionService,
}

impl<'a> EnrichmentPipeline<'a> {
    pub fn new(
        registry: &'a ServiceRegistry,
        store: &'a dyn TableStore,
        reconciliation: &'a dyn ReconciliationService,
        extension: &'a dyn ExtensionService,
    ) -> Self {
        Self {
            registry,
            store,
            reconciliation,
            extension,
        }
    }

    pub fn run(
        &self,
        dataset_id: &str,
        table_id: &str,
        reconcile: Option<&ReconcileStep>,
        extensions: &[ExtendStep],
    ) -> Result<PipelineReport, EnrichError> {
        let reconciler: Option<Reconciler> = reconcile
            .map(|step| self.registry.reconciler(&step.reconciliator_id))
            .transpose()?;
        let extenders: Vec<Extender> = extensions
            .iter()
            .map(|step| self.registry.extender(&step.extender_id))
            .collect::<Result<_, _>>()?;

        let raw = self.store.get_raw_table(dataset_id, table_id)?;
        let mut table = from_backend_document(&raw)?;
        tracing::info!(dataset_id, table_id, rows = table.n_rows(), "loaded table");

        let reconcile_outcome = match (reconcile, reconciler) {
            (Some(step), Some(reconciler)) => {
                let secondary: Vec<&str> = step.secondary_columns.iter().map(String::as_str).collect();
                let request = build_reconciliation_request(&table, &step.column, &reconciler, &secondary)?;
                let raw = self.reconciliation.reconcile(&reconciler.id, &request)?;
                let response = parse_reconciliation_response(&raw)?;
                Some(apply_reconciliation(
                    &mut table,
                    &step.column,
                    &response,
                    &reconciler,
                    chrono::Utc::now(),
                )?)
            }
            _ => None,
        };

        let mut extension_outcomes = Vec::with_capacity(extensions.len());
        for (step, extender) in extensions.iter().zip(&extenders) {
            extension_outcomes.push(run_extension(
                &mut table,
                &step.column,
                extender,
                &step.properties,
                &step.options,
                self.extension,
            )?);
        }

        let document = to_backend_payload(&table)?;
        self.store.put_table(dataset_id, table_id, &document)?;
        tracing::info!(
            dataset_id,
            table_id,
            reconciliated = document.table_instance.n_cells_reconciliated,
            "table updated"
        );

        Ok(PipelineReport {
            reconcile: reconcile_outcome,
            extensions: extension_outcomes,
            document,
        })
    }
}
