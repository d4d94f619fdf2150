//! Backend table document and the composer that produces and parses it.
//!
//! Outbound documents always use the normalized `{byId, allIds}` layout under
//! `tableInstance`. Inbound documents are accepted in that layout or in the
//! plain `{table, columns: {id: ..}, rows: {id: ..}}` layout the backend
//! returns from a table GET.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use semtab_model::aggregate::{self, TableScoreSummary};
use semtab_model::{
    canonical_candidate, de_label, de_string_or_number, Candidate, Cell, Column, TableMeta, TableModel,
};

use crate::error::ProtocolError;
use crate::ordered::OrderedMap;

/// Key carrying the flattened cell entities on a reconciled column's
/// metadata wrapper.
pub const ENTITY_KEY: &str = "entity";
/// Id of the wrapper emitted for reconciled columns without metadata.
pub const PLACEHOLDER_ID: &str = "None:";
/// `match.reason` stamped on reconciled columns.
pub const RECONCILIATOR_REASON: &str = "reconciliator";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDocument {
    pub table_instance: TableInstance,
    pub columns: Collection<Column>,
    pub rows: Collection<WireRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInstance {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "de_string_or_number")]
    pub id_dataset: String,
    #[serde(default, deserialize_with = "de_label")]
    pub name: String,
    #[serde(default)]
    pub n_cols: usize,
    #[serde(default)]
    pub n_rows: usize,
    #[serde(default)]
    pub n_cells: usize,
    #[serde(default)]
    pub n_cells_reconciliated: usize,
    #[serde(default, deserialize_with = "de_label")]
    pub last_modified_date: String,
    #[serde(default)]
    pub min_meta_score: f64,
    #[serde(default)]
    pub max_meta_score: f64,
}

/// Normalized `{byId, allIds}` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection<T> {
    pub by_id: OrderedMap<T>,
    pub all_ids: Vec<String>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            by_id: OrderedMap::new(),
            all_ids: Vec::new(),
        }
    }
}

impl<T> Collection<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            by_id: OrderedMap::with_capacity(capacity),
            all_ids: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, id: &str, item: T) {
        self.all_ids.push(id.to_string());
        self.by_id.insert(id, item);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRow {
    pub id: String,
    pub cells: OrderedMap<Cell>,
}

// ---------------------------------------------------------------------------
// Compose
// ---------------------------------------------------------------------------

/// Project a table into the backend document.
///
/// Pure: the table is not touched. Score counters are recomputed from the
/// cells, never read from the table's stored summary.
pub fn to_backend_payload(table: &TableModel) -> Result<BackendDocument, ProtocolError> {
    let summary = aggregate::recompute_table(table);

    let mut columns = Collection::with_capacity(table.n_cols());
    for column in table.columns() {
        columns.push(&column.id, compose_column(table, column)?);
    }

    let mut rows = Collection::with_capacity(table.n_rows());
    for row in table.rows() {
        let cells = table
            .row_cells(row)
            .map(|(column_id, cell)| (column_id, cell.clone()))
            .collect();
        rows.push(
            &row.id,
            WireRow {
                id: row.id.clone(),
                cells,
            },
        );
    }

    Ok(BackendDocument {
        table_instance: table_instance(table, &summary),
        columns,
        rows,
    })
}

fn table_instance(table: &TableModel, summary: &TableScoreSummary) -> TableInstance {
    TableInstance {
        id: table.meta.id.clone(),
        id_dataset: table.meta.id_dataset.clone(),
        name: table.meta.name.clone(),
        n_cols: table.n_cols(),
        n_rows: table.n_rows(),
        n_cells: table.n_cells(),
        n_cells_reconciliated: summary.n_cells_reconciliated,
        last_modified_date: table.meta.last_modified_date.clone(),
        min_meta_score: summary.min_meta_score,
        max_meta_score: summary.max_meta_score,
    }
}

/// Reconciled columns carry a single metadata wrapper whose `entity` list
/// holds the distinct canonical candidates of their cells, in row order.
fn compose_column(table: &TableModel, column: &Column) -> Result<Column, ProtocolError> {
    let mut out = column.clone();
    if !column.is_reconciled() {
        return Ok(out);
    }

    if let Ok(summary) = aggregate::recompute_column(table, &column.id) {
        if summary.annotated_cells > 0 {
            out.annotation_meta = Some(summary.to_annotation(Some(RECONCILIATOR_REASON)));
        }
    }

    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    if let Ok(cells) = table.cells_in_column(&column.id) {
        for (_, cell) in cells {
            if let Some(candidate) = canonical_candidate(&cell.metadata) {
                if seen.insert(candidate.id.as_str()) {
                    entities.push(serde_json::to_value(candidate)?);
                }
            }
        }
    }

    // The wrapper is the column's own candidate as stored by reconciliation;
    // the `None:` placeholder only stands in when the column has none.
    let mut wrapper = column
        .metadata
        .first()
        .cloned()
        .unwrap_or_else(|| Candidate::new(PLACEHOLDER_ID, "", 0.0, true));
    wrapper.properties.insert(ENTITY_KEY.to_string(), Value::Array(entities));
    out.metadata = vec![wrapper];
    Ok(out)
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

pub fn from_backend_json(text: &str) -> Result<TableModel, ProtocolError> {
    let doc: Value = serde_json::from_str(text)?;
    from_backend_document(&doc)
}

/// Rebuild a table from a backend document.
///
/// The header may be under `table` or `tableInstance`; `columns` and `rows`
/// may be `{byId, allIds}` collections or plain id-keyed objects. Stored
/// score counters are ignored and recomputed from the cells.
pub fn from_backend_document(doc: &Value) -> Result<TableModel, ProtocolError> {
    let root = doc
        .as_object()
        .ok_or_else(|| ProtocolError::malformed("document is not a JSON object"))?;

    let header = root
        .get("table")
        .or_else(|| root.get("tableInstance"))
        .ok_or_else(|| ProtocolError::malformed("missing `table` key"))?;
    let columns = root
        .get("columns")
        .ok_or_else(|| ProtocolError::malformed("missing `columns` key"))?;
    let rows = root
        .get("rows")
        .ok_or_else(|| ProtocolError::malformed("missing `rows` key"))?;

    let meta: TableMeta = serde_json::from_value(header.clone())
        .map_err(|e| ProtocolError::malformed(format!("table header: {e}")))?;
    let mut table = TableModel::new(meta);

    for (id, raw) in entries(columns, "columns")? {
        let mut column: Column = serde_json::from_value(raw.clone())
            .map_err(|e| ProtocolError::malformed(format!("column `{id}`: {e}")))?;
        unwrap_column_metadata(&mut column);
        table.upsert_column(&id, column);
    }

    for (id, raw) in entries(rows, "rows")? {
        table
            .push_row(id.as_str())
            .map_err(|e| ProtocolError::malformed(e.to_string()))?;
        let cells = raw
            .get("cells")
            .and_then(Value::as_object)
            .ok_or_else(|| ProtocolError::malformed(format!("row `{id}` has no `cells` object")))?;
        for (column_id, raw_cell) in cells {
            let cell: Cell = serde_json::from_value(raw_cell.clone())
                .map_err(|e| ProtocolError::malformed(format!("cell `{id}${column_id}`: {e}")))?;
            table.set_cell(&id, column_id, cell).map_err(|_| {
                ProtocolError::malformed(format!("row `{id}` references unknown column `{column_id}`"))
            })?;
        }
    }

    aggregate::refresh(&mut table);
    table.drain_journal();
    tracing::debug!(
        table = %table.meta.id,
        columns = table.n_cols(),
        rows = table.n_rows(),
        "parsed backend document"
    );
    Ok(table)
}

/// Enumerate a collection in its stored order.
fn entries<'a>(value: &'a Value, what: &str) -> Result<Vec<(String, &'a Value)>, ProtocolError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ProtocolError::malformed(format!("`{what}` is not an object")))?;

    match (obj.get("byId"), obj.get("allIds")) {
        (Some(Value::Object(by_id)), Some(Value::Array(all_ids))) => all_ids
            .iter()
            .map(|raw_id| {
                let id = id_string(raw_id)
                    .ok_or_else(|| ProtocolError::malformed(format!("`{what}.allIds` holds a non-scalar id")))?;
                let item = by_id
                    .get(&id)
                    .ok_or_else(|| ProtocolError::malformed(format!("`{what}.byId` has no entry `{id}`")))?;
                Ok((id, item))
            })
            .collect(),
        _ => Ok(plain_entries(obj)),
    }
}

fn plain_entries(obj: &Map<String, Value>) -> Vec<(String, &Value)> {
    obj.iter().map(|(k, v)| (k.clone(), v)).collect()
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Inverse of the reconciled-column wrapper: drop the derived `entity`
/// list and the placeholder wrapper.
fn unwrap_column_metadata(column: &mut Column) {
    for candidate in &mut column.metadata {
        candidate.properties.remove(ENTITY_KEY);
    }
    column.metadata.retain(|c| c.id != PLACEHOLDER_ID);
}

#[cfg(test)]
mod tests {
    use super::*;
    use semtab_model::aggregate::annotate_candidates;
    use semtab_model::ColumnStatus;
    use serde_json::json;

    fn reconciled_table() -> TableModel {
        let mut t = TableModel::new(TableMeta {
            id: "5".into(),
            id_dataset: "2".into(),
            name: "cities".into(),
            last_modified_date: String::new(),
        });
        let mut city = Column::new("City");
        city.status = ColumnStatus::Reconciliated;
        t.upsert_column("City", city);
        t.upsert_column("Date", Column::new("Date"));

        let rows = [("r1", "Rome", "geo:1", 0.9, true), ("r2", "Turin", "geo:2", 0.4, false)];
        for (row, label, id, score, matched) in rows {
            t.push_row(row).unwrap();
            let mut cell = Cell::labeled(label);
            cell.metadata = vec![Candidate::new(id, label, score, matched)];
            cell.annotation_meta = annotate_candidates(&cell.metadata);
            t.set_cell(row, "City", cell).unwrap();
            t.set_cell(row, "Date", Cell::labeled("2024-03-01")).unwrap();
        }
        t
    }

    #[test]
    fn payload_recomputes_counters() {
        let t = reconciled_table();
        let doc = to_backend_payload(&t).unwrap();
        let ti = &doc.table_instance;
        assert_eq!((ti.n_cols, ti.n_rows, ti.n_cells), (2, 2, 4));
        assert_eq!(ti.n_cells_reconciliated, 2);
        assert_eq!(ti.min_meta_score, 0.4);
        assert_eq!(ti.max_meta_score, 0.9);
        // stored summary was never refreshed
        assert_eq!(t.summary().n_cells_reconciliated, 0);
    }

    #[test]
    fn reconciled_column_is_wrapped() {
        let doc = to_backend_payload(&reconciled_table()).unwrap();
        let city = doc.columns.by_id.get("City").unwrap();
        assert_eq!(city.metadata.len(), 1);
        assert_eq!(city.metadata[0].id, PLACEHOLDER_ID);
        let entity = city.metadata[0].properties[ENTITY_KEY].as_array().unwrap();
        // r2 has no matched candidate
        assert_eq!(entity.len(), 1);
        assert_eq!(entity[0]["id"], "geo:1");

        let meta = city.annotation_meta.as_ref().unwrap();
        assert!(!meta.match_info.value);
        assert_eq!(meta.match_info.reason.as_deref(), Some(RECONCILIATOR_REASON));

        let date = doc.columns.by_id.get("Date").unwrap();
        assert!(date.metadata.is_empty());
    }

    #[test]
    fn stored_column_candidate_is_the_wrapper() {
        let mut t = TableModel::new(TableMeta::default());
        let mut city = Column::new("City");
        city.status = ColumnStatus::Reconciliated;
        city.metadata = vec![Candidate::new("geo:city", "city", 1.0, true)];
        t.upsert_column("City", city);
        for (row, id) in [("r1", "geo:1"), ("r2", "geo:1"), ("r3", "geo:2")] {
            t.push_row(row).unwrap();
            let mut cell = Cell::labeled(row);
            cell.metadata = vec![Candidate::new(id, row, 1.0, true)];
            t.set_cell(row, "City", cell).unwrap();
        }

        let doc = to_backend_payload(&t).unwrap();
        let city = doc.columns.by_id.get("City").unwrap();
        assert_eq!(city.metadata.len(), 1);
        assert_eq!(city.metadata[0].id, "geo:city");
        let ids: Vec<_> = city.metadata[0].properties[ENTITY_KEY]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["geo:1", "geo:2"]);
    }

    #[test]
    fn wire_shape() {
        let doc = to_backend_payload(&reconciled_table()).unwrap();
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["tableInstance"]["idDataset"], "2");
        assert_eq!(v["columns"]["allIds"], json!(["City", "Date"]));
        assert_eq!(v["rows"]["allIds"], json!(["r1", "r2"]));
        assert_eq!(v["rows"]["byId"]["r2"]["cells"]["City"]["id"], "r2$City");
        assert_eq!(v["rows"]["byId"]["r2"]["cells"]["City"]["annotationMeta"]["lowestScore"], 0.4);
    }

    #[test]
    fn parse_plain_layout() {
        let doc = json!({
            "table": {"id": 5, "idDataset": 2, "name": "cities", "nCellsReconciliated": 99},
            "columns": {
                "City": {"id": "City", "label": "City", "status": "empty", "context": {}, "metadata": []}
            },
            "rows": {
                "r0": {"id": "r0", "cells": {"City": {"id": "r0$City", "label": "Rome", "metadata": []}}}
            }
        });
        let t = from_backend_document(&doc).unwrap();
        assert_eq!(t.meta.id, "5");
        assert_eq!(t.summary().n_cells_reconciliated, 0);
        assert_eq!(t.get_cell("r0", "City").unwrap().unwrap().label, "Rome");
        assert!(t.journal().is_empty());
    }

    #[test]
    fn parse_strips_wrapper() {
        let t = reconciled_table();
        let v = serde_json::to_value(to_backend_payload(&t).unwrap()).unwrap();
        let back = from_backend_document(&v).unwrap();
        assert!(back.get_column("City").unwrap().metadata.is_empty());
    }

    #[test]
    fn unknown_column_in_row_is_malformed() {
        let doc = json!({
            "table": {"id": "1", "idDataset": "1"},
            "columns": {},
            "rows": {"r0": {"id": "r0", "cells": {"Ghost": {"label": "x"}}}}
        });
        let err = from_backend_document(&doc).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedDocument(msg) if msg.contains("Ghost")));
    }

    #[test]
    fn dangling_all_ids_is_malformed() {
        let doc = json!({
            "tableInstance": {"id": "1", "idDataset": "1"},
            "columns": {"byId": {}, "allIds": ["A"]},
            "rows": {"byId": {}, "allIds": []}
        });
        assert!(matches!(
            from_backend_document(&doc),
            Err(ProtocolError::MalformedDocument(_))
        ));
    }
}
