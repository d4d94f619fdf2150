//! Reconciliation: merge a candidate-list response into a table column.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use semtab_model::aggregate::{self, annotate_candidates};
use semtab_model::{
    canonical_candidate, Candidate, CellKey, ColumnKind, ColumnStatus, ContextEntry, Mutation, TableModel,
};
use semtab_protocol::document::RECONCILIATOR_REASON;
use semtab_protocol::{OrderedMap, ReconciliationItem, ReconciliationRequest, ReconciliationResult, SecondaryValue};

use crate::config::{Reconciler, ReconcilerKind, ServiceRegistry};
use crate::error::{EnrichError, RowWarning, ValidationError, WarningReason};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileOutcome {
    /// Annotated cells in the column after the merge.
    pub annotated_cells: usize,
    /// Cells written by this call.
    pub cells_written: usize,
    pub warnings: Vec<RowWarning>,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Build the service request for `column`.
///
/// The first item is the column itself, followed by one item per row that
/// has a cell in the column. Geocoding reconcilers also get the labels of
/// up to two secondary columns as `secondPart` / `thirdPart`; rows without
/// a cell there contribute `""`.
pub fn build_reconciliation_request(
    table: &TableModel,
    column: &str,
    reconciler: &Reconciler,
    secondary_columns: &[&str],
) -> Result<ReconciliationRequest, EnrichError> {
    let mut items = vec![ReconciliationItem {
        id: column.to_string(),
        label: column.to_string(),
    }];
    for (row_id, cell) in table
        .cells_in_column(column)
        .map_err(|_| ValidationError::UnknownColumn(column.to_string()))?
    {
        items.push(ReconciliationItem {
            id: CellKey::format(row_id, column),
            label: cell.label.clone(),
        });
    }

    let mut request = ReconciliationRequest {
        service_id: reconciler.id.clone(),
        items,
        second_part: None,
        third_part: None,
    };

    match reconciler.kind() {
        ReconcilerKind::Lookup => {
            if !secondary_columns.is_empty() {
                tracing::debug!(service = %reconciler.id, "lookup reconciler ignores secondary columns");
            }
        }
        ReconcilerKind::Geocoding => {
            if let Some(second) = secondary_columns.first() {
                request.second_part = Some(secondary_part(table, second)?);
            }
            if let Some(third) = secondary_columns.get(1) {
                request.third_part = Some(secondary_part(table, third)?);
            }
        }
    }

    Ok(request)
}

fn secondary_part(table: &TableModel, column: &str) -> Result<OrderedMap<SecondaryValue>, EnrichError> {
    if table.get_column(column).is_none() {
        return Err(ValidationError::UnknownColumn(column.to_string()).into());
    }
    let mut part = OrderedMap::new();
    for row_id in table.row_ids() {
        let label = table
            .get_cell(row_id, column)?
            .map(|cell| cell.label.clone())
            .unwrap_or_default();
        part.insert(row_id, SecondaryValue::new(label, column));
    }
    Ok(part)
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Decode a raw service response into its items.
pub fn parse_reconciliation_response(raw: &Value) -> Result<Vec<ReconciliationResult>, EnrichError> {
    serde_json::from_value(raw.clone())
        .map_err(|e| EnrichError::integrity(format!("malformed reconciliation response: {e}")))
}

/// Resolve `reconciliator_id` and merge `response` into `column`.
pub fn reconcile(
    registry: &ServiceRegistry,
    table: &mut TableModel,
    column: &str,
    response: &[ReconciliationResult],
    reconciliator_id: &str,
) -> Result<ReconcileOutcome, EnrichError> {
    let reconciler = registry.reconciler(reconciliator_id)?;
    apply_reconciliation(table, column, response, &reconciler, Utc::now())
}

/// Merge a reconciliation response into `column`, stamping `now` as the
/// table's modification time.
///
/// Structural problems (unknown column, no column item) fail before the
/// table is touched. Row items that cannot be routed are skipped with a
/// [`RowWarning`]. Applying the same response twice leaves the table as a
/// single application would.
pub fn apply_reconciliation(
    table: &mut TableModel,
    column: &str,
    response: &[ReconciliationResult],
    reconciler: &Reconciler,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, EnrichError> {
    let Some(base) = table.get_column(column).cloned() else {
        return Err(ValidationError::UnknownColumn(column.to_string()).into());
    };

    let column_item = response
        .iter()
        .find(|item| item.id == column)
        .ok_or_else(|| EnrichError::integrity(format!("response has no item for column '{column}'")))?;

    // Route every row item before mutating anything.
    let mut warnings = Vec::new();
    let mut routed = Vec::new();
    for item in response.iter().filter(|item| item.id != column) {
        let Some(key) = CellKey::parse(&item.id) else {
            warnings.push(RowWarning::emit(&item.id, column, WarningReason::MalformedId));
            continue;
        };
        if key.column != column {
            warnings.push(RowWarning::emit(&item.id, column, WarningReason::ColumnMismatch));
            continue;
        }
        if !table.has_row(&key.row) {
            warnings.push(RowWarning::emit(&item.id, column, WarningReason::UnknownRow));
            continue;
        }
        if table.get_cell(&key.row, column)?.is_none() {
            warnings.push(RowWarning::emit(&item.id, column, WarningReason::MissingCell));
            continue;
        }
        if item.metadata.is_empty() {
            warnings.push(RowWarning::emit(&item.id, column, WarningReason::NoCandidates));
            continue;
        }
        routed.push((key.row, normalize(&item.metadata, reconciler)));
    }

    let journal_start = table.journal().len();

    for (row_id, candidates) in routed {
        let Some(mut cell) = table.get_cell(&row_id, column)?.cloned() else {
            continue;
        };
        cell.annotation_meta = annotate_candidates(&candidates);
        cell.metadata = candidates;
        table.set_cell(&row_id, column, cell)?;
    }

    let summary = aggregate::recompute_column(table, column)?;
    let column_candidates = normalize(&column_item.metadata, reconciler);

    let mut updated = base;
    updated.status = ColumnStatus::Reconciliated;
    updated.kind = Some(ColumnKind::Entity);
    updated.context.insert(
        reconciler.spec.prefix.clone(),
        ContextEntry {
            uri: reconciler.spec.uri.clone(),
            total: table.n_rows(),
            reconciliated: summary.annotated_cells,
        },
    );
    updated.metadata = column_canonical(&column_candidates).into_iter().cloned().collect();
    updated.annotation_meta = (summary.annotated_cells > 0).then(|| summary.to_annotation(Some(RECONCILIATOR_REASON)));
    table.upsert_column(column, updated);

    aggregate::refresh(table);
    table.meta.last_modified_date = format_timestamp(now);

    let cells_written = table.journal()[journal_start..]
        .iter()
        .filter(|m| matches!(m, Mutation::CellWritten { .. }))
        .count();

    tracing::info!(
        column,
        service = %reconciler.id,
        annotated = summary.annotated_cells,
        skipped = warnings.len(),
        "reconciled column"
    );

    Ok(ReconcileOutcome {
        annotated_cells: summary.annotated_cells,
        cells_written,
        warnings,
    })
}

/// First matched candidate, else the first candidate.
fn column_canonical(candidates: &[Candidate]) -> Option<&Candidate> {
    canonical_candidate(candidates).or_else(|| candidates.first())
}

/// Fill entity URIs the service left out.
fn normalize(candidates: &[Candidate], reconciler: &Reconciler) -> Vec<Candidate> {
    candidates
        .iter()
        .map(|c| {
            let mut c = c.clone();
            if c.name.uri.is_empty() {
                c.name.uri = reconciler.entity_uri(&c.id);
            }
            c
        })
        .collect()
}

/// Backend timestamp format: `2024-03-01T10:00:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
