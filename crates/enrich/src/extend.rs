//! Extension: add property columns next to a reconciled column.
//!
//! Both strategies first build a complete plan (every new column and cell)
//! and validate it against the table; only a fully valid plan is committed.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use semtab_model::aggregate;
use semtab_model::{canonical_candidate, Cell, Column, ColumnKind, Mutation, TableModel};
use semtab_protocol::{ExtensionRequest, ExtensionResponse, OrderedMap, SecondaryValue};

use crate::collab::ExtensionService;
use crate::config::{ExtenderKind, Extender, ExtensionParam, ServiceRegistry};
use crate::error::{EnrichError, RowWarning, ValidationError, WarningReason};
use crate::reconcile::format_timestamp;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Decimal separator for numeric labels of new columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalFormat {
    Dot,
    Comma,
}

impl DecimalFormat {
    fn wire(self) -> Vec<String> {
        match self {
            Self::Dot => Vec::new(),
            Self::Comma => vec![",".to_string()],
        }
    }
}

/// What to store for rows the extension produced no value for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingCellPolicy {
    /// No cell at all.
    #[default]
    Absent,
    /// A cell with an empty label.
    Blank,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionOptions {
    /// Column whose labels are sent as per-row dates.
    pub date_column: Option<String>,
    pub decimal_format: Option<DecimalFormat>,
    pub missing_cells: MissingCellPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtensionOutcome {
    pub columns_created: Vec<String>,
    pub cells_written: usize,
    pub warnings: Vec<RowWarning>,
    /// Service `meta` block, passed through untouched.
    pub meta: Option<Value>,
}

/// Id of the column derived from `base` for `property`.
pub fn derived_column_id(base: &str, property: &str) -> String {
    format!("{base}_{property}")
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Resolve `extender_id` and extend `column` with `properties`.
///
/// `service` is only called by external extenders.
pub fn extend_column(
    registry: &ServiceRegistry,
    table: &mut TableModel,
    column: &str,
    extender_id: &str,
    properties: &[String],
    options: &ExtensionOptions,
    service: &dyn ExtensionService,
) -> Result<ExtensionOutcome, EnrichError> {
    let extender = registry.extender(extender_id)?;
    run_extension(table, column, &extender, properties, options, service)
}

pub fn run_extension(
    table: &mut TableModel,
    column: &str,
    extender: &Extender,
    properties: &[String],
    options: &ExtensionOptions,
    service: &dyn ExtensionService,
) -> Result<ExtensionOutcome, EnrichError> {
    validate_extension(table, column, extender, properties, options)?;

    match extender.kind() {
        ExtenderKind::DerivedFromReconciled => derive_from_reconciled(table, column, properties, options),
        ExtenderKind::ExternalService => {
            let plan = build_extension_request(table, column, extender, properties, options)?;
            let raw = service.extend(&extender.id, &plan.request)?;
            let mut outcome = apply_extension_response(table, &raw, options)?;
            let mut warnings = plan.warnings;
            warnings.append(&mut outcome.warnings);
            outcome.warnings = warnings;
            Ok(outcome)
        }
    }
}

/// Checks shared by every strategy. Never touches the table.
pub fn validate_extension(
    table: &TableModel,
    column: &str,
    extender: &Extender,
    properties: &[String],
    options: &ExtensionOptions,
) -> Result<(), ValidationError> {
    if properties.is_empty() {
        return Err(ValidationError::NoProperties);
    }
    for param in &extender.spec.required {
        let present = match param {
            ExtensionParam::DateColumn => options.date_column.is_some(),
            ExtensionParam::DecimalFormat => options.decimal_format.is_some(),
        };
        if !present {
            return Err(ValidationError::MissingParameter {
                extender: extender.id.clone(),
                parameter: param.name().to_string(),
            });
        }
    }
    require_reconciled(table, column)?;
    if let Some(date_column) = &options.date_column {
        if table.get_column(date_column).is_none() {
            return Err(ValidationError::UnknownColumn(date_column.clone()));
        }
    }
    Ok(())
}

fn require_reconciled(table: &TableModel, column: &str) -> Result<(), ValidationError> {
    match table.get_column(column) {
        None => Err(ValidationError::UnknownColumn(column.to_string())),
        Some(c) if !c.is_reconciled() => Err(ValidationError::NotReconciled(column.to_string())),
        Some(_) => Ok(()),
    }
}

/// A new column may only replace a column that extension produced.
fn check_collision(table: &TableModel, column_id: &str) -> Result<(), ValidationError> {
    match table.get_column(column_id) {
        Some(existing) if existing.kind != Some(ColumnKind::Extended) => {
            Err(ValidationError::ColumnCollision(column_id.to_string()))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Plan / commit
// ---------------------------------------------------------------------------

struct PlannedColumn {
    id: String,
    label: String,
    cells: Vec<(String, Cell)>,
}

fn commit(
    table: &mut TableModel,
    mut plans: Vec<PlannedColumn>,
    options: &ExtensionOptions,
) -> Result<(Vec<String>, usize), EnrichError> {
    if options.missing_cells == MissingCellPolicy::Blank {
        for plan in &mut plans {
            let present: HashSet<String> = plan.cells.iter().map(|(r, _)| r.clone()).collect();
            let blanks: Vec<(String, Cell)> = table
                .row_ids()
                .filter(|r| !present.contains(*r))
                .map(|r| (r.to_string(), Cell::labeled("")))
                .collect();
            plan.cells.extend(blanks);
        }
    }
    if options.decimal_format == Some(DecimalFormat::Comma) {
        for plan in &mut plans {
            apply_decimal_comma(&mut plan.cells);
        }
    }

    let journal_start = table.journal().len();
    let mut created = Vec::with_capacity(plans.len());

    for plan in plans {
        let replacing = table.get_column(&plan.id).is_some();
        table.upsert_column(&plan.id, Column::extended(plan.id.as_str(), plan.label));
        if replacing {
            table.clear_column(&plan.id)?;
        }
        for (row_id, cell) in plan.cells {
            table.set_cell(&row_id, &plan.id, cell)?;
        }
        created.push(plan.id);
    }

    aggregate::refresh(table);
    table.meta.last_modified_date = format_timestamp(Utc::now());

    let cells_written = table.journal()[journal_start..]
        .iter()
        .filter(|m| matches!(m, Mutation::CellWritten { .. }))
        .count();
    Ok((created, cells_written))
}

/// `'.'` -> `','` on every label, if every non-empty label is numeric.
fn apply_decimal_comma(cells: &mut [(String, Cell)]) {
    let mut labels = cells.iter().map(|(_, c)| c.label.trim()).filter(|l| !l.is_empty()).peekable();
    if labels.peek().is_none() {
        return;
    }
    if !labels.all(|l| l.parse::<f64>().is_ok()) {
        return;
    }
    for (_, cell) in cells.iter_mut() {
        cell.label = cell.label.replace('.', ",");
    }
}

// ---------------------------------------------------------------------------
// Derived from reconciled
// ---------------------------------------------------------------------------

/// One sibling column per property, projected from each row's canonical
/// candidate. Rows without a base cell or a canonical candidate, or whose
/// candidate lacks the property, get no cell (see [`MissingCellPolicy`]).
pub fn derive_from_reconciled(
    table: &mut TableModel,
    column: &str,
    properties: &[String],
    options: &ExtensionOptions,
) -> Result<ExtensionOutcome, EnrichError> {
    if properties.is_empty() {
        return Err(ValidationError::NoProperties.into());
    }
    require_reconciled(table, column)?;

    let mut plans: Vec<PlannedColumn> = properties
        .iter()
        .map(|property| {
            let id = derived_column_id(column, property);
            check_collision(table, &id)?;
            Ok(PlannedColumn {
                label: id.clone(),
                id,
                cells: Vec::new(),
            })
        })
        .collect::<Result<_, ValidationError>>()?;

    let mut warnings = Vec::new();
    for row_id in table.row_ids() {
        let Some(cell) = table.get_cell(row_id, column)? else {
            warnings.push(RowWarning::emit(row_id, column, WarningReason::MissingCell));
            continue;
        };
        let Some(canonical) = canonical_candidate(&cell.metadata) else {
            warnings.push(RowWarning::emit(row_id, column, WarningReason::NoCanonicalCandidate));
            continue;
        };
        for (property, plan) in properties.iter().zip(plans.iter_mut()) {
            match canonical.project(property) {
                Some(label) => plan.cells.push((row_id.to_string(), Cell::labeled(label))),
                None => warnings.push(RowWarning::emit(row_id, &plan.id, WarningReason::MissingProperty)),
            }
        }
    }

    let (columns_created, cells_written) = commit(table, plans, options)?;
    tracing::info!(column, columns = ?columns_created, cells = cells_written, "derived columns from reconciled entities");

    Ok(ExtensionOutcome {
        columns_created,
        cells_written,
        warnings,
        meta: None,
    })
}

// ---------------------------------------------------------------------------
// External service
// ---------------------------------------------------------------------------

/// An extension request plus the rows left out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionPlan {
    pub request: ExtensionRequest,
    pub warnings: Vec<RowWarning>,
}

/// Build the request for an external extender.
///
/// Only rows whose cell has a canonical candidate are sent. With a date
/// column, every row's date label is sent as `dates` and the properties
/// double as `weatherParams`.
pub fn build_extension_request(
    table: &TableModel,
    column: &str,
    extender: &Extender,
    properties: &[String],
    options: &ExtensionOptions,
) -> Result<ExtensionPlan, EnrichError> {
    require_reconciled(table, column)?;

    let mut entities = OrderedMap::new();
    let mut warnings = Vec::new();
    for (row_id, cell) in table.cells_in_column(column)? {
        match canonical_candidate(&cell.metadata) {
            Some(canonical) => entities.insert(row_id, canonical.id.clone()),
            None => warnings.push(RowWarning::emit(row_id, column, WarningReason::NoCanonicalCandidate)),
        }
    }
    let mut items = OrderedMap::new();
    items.insert(column, entities);

    let dates = match &options.date_column {
        Some(date_column) => {
            let mut dates = OrderedMap::new();
            for row_id in table.row_ids() {
                let label = table
                    .get_cell(row_id, date_column)?
                    .map(|c| c.label.clone())
                    .unwrap_or_default();
                dates.insert(row_id, SecondaryValue::new(label, date_column.as_str()));
            }
            Some(dates)
        }
        None => None,
    };

    let request = ExtensionRequest {
        service_id: extender.id.clone(),
        items,
        property: properties.to_vec(),
        weather_params: dates.as_ref().map(|_| properties.to_vec()),
        dates,
        decimal_format: options.decimal_format.map(DecimalFormat::wire),
    };
    Ok(ExtensionPlan { request, warnings })
}

/// Merge an extension service response.
///
/// Each response column becomes an `extended` column keyed by its property
/// key. A response that does not decode, or that names a row the table
/// does not have, is a data-integrity error and nothing is written.
pub fn apply_extension_response(
    table: &mut TableModel,
    raw: &Value,
    options: &ExtensionOptions,
) -> Result<ExtensionOutcome, EnrichError> {
    let response: ExtensionResponse = serde_json::from_value(raw.clone())
        .map_err(|e| EnrichError::integrity(format!("malformed extension response: {e}")))?;

    let mut plans = Vec::with_capacity(response.columns.len());
    for (key, column) in response.columns {
        check_collision(table, &key)?;
        let mut cells = Vec::with_capacity(column.cells.len());
        for (row_id, wire_cell) in column.cells {
            if !table.has_row(&row_id) {
                return Err(EnrichError::integrity(format!(
                    "extension column '{key}' references unknown row '{row_id}'"
                )));
            }
            let mut cell = Cell::labeled(wire_cell.label);
            cell.metadata = wire_cell.metadata;
            cells.push((row_id, cell));
        }
        let label = if column.label.is_empty() { key.clone() } else { column.label };
        plans.push(PlannedColumn { id: key, label, cells });
    }

    let (columns_created, cells_written) = commit(table, plans, options)?;
    tracing::info!(columns = ?columns_created, cells = cells_written, "merged extension response");

    Ok(ExtensionOutcome {
        columns_created,
        cells_written,
        warnings: Vec::new(),
        meta: response.meta,
    })
}
