use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

use crate::aggregate::TableScoreSummary;
use crate::candidate::{AnnotationMeta, Candidate};
use crate::cell_key::CellKey;
use crate::error::ModelError;
use crate::serde_ids::{de_label, de_string_or_number};

/// Position of a column in creation order. Stable for the table's lifetime.
pub type ColumnSlot = usize;
/// Position of a row in creation order. Stable for the table's lifetime.
pub type RowSlot = usize;

// ---------------------------------------------------------------------------
// Table header
// ---------------------------------------------------------------------------

/// Caller-owned table header fields.
///
/// The reconciled-cell count and score bounds are not here: they are derived
/// and only ever written through [`TableModel::apply_summary`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "de_string_or_number")]
    pub id_dataset: String,
    #[serde(default, deserialize_with = "de_label")]
    pub name: String,
    #[serde(default, deserialize_with = "de_label")]
    pub last_modified_date: String,
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnStatus {
    #[default]
    Empty,
    Pending,
    Reconciliated,
    Extended,
}

impl ColumnStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Pending | Self::Reconciliated => 1,
            Self::Extended => 2,
        }
    }

    /// Status after moving towards `next`. Never goes backwards.
    pub fn advance(self, next: Self) -> Self {
        if next.rank() >= self.rank() {
            next
        } else {
            self
        }
    }
}

impl std::fmt::Display for ColumnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Pending => write!(f, "pending"),
            Self::Reconciliated => write!(f, "reconciliated"),
            Self::Extended => write!(f, "extended"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Entity,
    Literal,
    Extended,
}

impl ColumnKind {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "entity" => Some(Self::Entity),
            "literal" => Some(Self::Literal),
            "extended" => Some(Self::Extended),
            _ => None,
        }
    }
}

/// Lenient column-kind decoding: unknown or empty kinds become `None`.
pub fn de_column_kind<'de, D>(deserializer: D) -> Result<Option<ColumnKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|k| {
        let kind = ColumnKind::from_wire(k);
        if kind.is_none() && !k.is_empty() {
            tracing::debug!(kind = k, "ignoring unknown column kind");
        }
        kind
    }))
}

/// Provenance of the reconciliation source used for a column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub reconciliated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "de_label")]
    pub label: String,
    #[serde(default)]
    pub status: ColumnStatus,
    /// Knowledge-base prefix -> provenance.
    #[serde(default)]
    pub context: BTreeMap<String, ContextEntry>,
    #[serde(default, deserialize_with = "de_column_kind", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ColumnKind>,
    #[serde(default)]
    pub metadata: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_meta: Option<AnnotationMeta>,
}

impl Column {
    /// A fresh, unannotated column whose label equals its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            status: ColumnStatus::Empty,
            context: BTreeMap::new(),
            kind: None,
            metadata: Vec::new(),
            annotation_meta: None,
        }
    }

    /// A column produced by extension.
    pub fn extended(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: ColumnStatus::Extended,
            kind: Some(ColumnKind::Extended),
            ..Self::new(id)
        }
    }

    pub fn is_reconciled(&self) -> bool {
        self.status == ColumnStatus::Reconciliated || self.kind == Some(ColumnKind::Entity)
    }
}

// ---------------------------------------------------------------------------
// Row / Cell
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    #[serde(default, deserialize_with = "de_label")]
    pub id: String,
    #[serde(default, deserialize_with = "de_label")]
    pub label: String,
    #[serde(default)]
    pub metadata: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_meta: Option<AnnotationMeta>,
}

impl Cell {
    /// An unannotated cell. The id is assigned when the cell is stored.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn is_annotated(&self) -> bool {
        self.annotation_meta.as_ref().is_some_and(|m| m.annotated)
    }
}

/// A row's cells, keyed by column slot so they enumerate in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    cells: BTreeMap<ColumnSlot, Cell>,
}

impl Row {
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

// ---------------------------------------------------------------------------
// Mutation journal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ColumnCreated { column: String },
    ColumnUpdated { column: String },
    CellWritten { row: String, column: String },
    ColumnCleared { column: String },
}

// ---------------------------------------------------------------------------
// TableModel
// ---------------------------------------------------------------------------

/// Canonical in-memory annotated table.
///
/// Columns and rows live in creation-ordered arenas addressed by slot.
/// No method recomputes aggregates; callers run the aggregator once per
/// batch of mutations and store the result with [`apply_summary`].
///
/// [`apply_summary`]: TableModel::apply_summary
#[derive(Debug, Clone)]
pub struct TableModel {
    pub meta: TableMeta,
    summary: TableScoreSummary,
    columns: Vec<Column>,
    column_slots: HashMap<String, ColumnSlot>,
    rows: Vec<Row>,
    row_slots: HashMap<String, RowSlot>,
    journal: Vec<Mutation>,
}

impl PartialEq for TableModel {
    // The journal is a side channel, not table content.
    fn eq(&self, other: &Self) -> bool {
        self.meta == other.meta
            && self.summary == other.summary
            && self.columns == other.columns
            && self.rows == other.rows
    }
}

impl TableModel {
    pub fn new(meta: TableMeta) -> Self {
        Self {
            meta,
            summary: TableScoreSummary::default(),
            columns: Vec::new(),
            column_slots: HashMap::new(),
            rows: Vec::new(),
            row_slots: HashMap::new(),
            journal: Vec::new(),
        }
    }

    // ── Rows ────────────────────────────────────────────────────────

    /// Append an empty row. Only dataset import creates rows.
    pub fn push_row(&mut self, row_id: impl Into<String>) -> Result<RowSlot, ModelError> {
        let row_id = row_id.into();
        if self.row_slots.contains_key(&row_id) {
            return Err(ModelError::DuplicateRow(row_id));
        }
        let slot = self.rows.len();
        self.row_slots.insert(row_id.clone(), slot);
        self.rows.push(Row {
            id: row_id,
            cells: BTreeMap::new(),
        });
        Ok(slot)
    }

    pub fn has_row(&self, row_id: &str) -> bool {
        self.row_slots.contains_key(row_id)
    }

    pub fn row_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.id.as_str())
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Cells of a row in column order, paired with their column id.
    pub fn row_cells<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = (&'a str, &'a Cell)> {
        row.cells
            .iter()
            .map(move |(slot, cell)| (self.columns[*slot].id.as_str(), cell))
    }

    // ── Columns ─────────────────────────────────────────────────────

    pub fn column_ids(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.id.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn get_column(&self, column_id: &str) -> Option<&Column> {
        self.column_slots.get(column_id).map(|&slot| &self.columns[slot])
    }

    /// Insert a new column at the end, or replace an existing one in place.
    ///
    /// The stored id is always `column_id`. An existing column's status only
    /// moves forward: replacing a `reconciliated` column with an `empty`
    /// one keeps `reconciliated`.
    pub fn upsert_column(&mut self, column_id: &str, mut column: Column) -> ColumnSlot {
        column.id = column_id.to_string();
        match self.column_slots.get(column_id) {
            Some(&slot) => {
                column.status = self.columns[slot].status.advance(column.status);
                self.columns[slot] = column;
                self.journal.push(Mutation::ColumnUpdated {
                    column: column_id.to_string(),
                });
                slot
            }
            None => {
                let slot = self.columns.len();
                self.column_slots.insert(column_id.to_string(), slot);
                self.columns.push(column);
                self.journal.push(Mutation::ColumnCreated {
                    column: column_id.to_string(),
                });
                slot
            }
        }
    }

    // ── Cells ───────────────────────────────────────────────────────

    /// Look up a cell. The row and column must exist; the cell may not.
    pub fn get_cell(&self, row_id: &str, column_id: &str) -> Result<Option<&Cell>, ModelError> {
        let (row_slot, column_slot) = self.slots(row_id, column_id)?;
        Ok(self.rows[row_slot].cells.get(&column_slot))
    }

    /// Candidate lists of one row, for the requested columns that have them.
    ///
    /// The row must exist. Unknown columns, absent cells and cells with no
    /// candidates are skipped.
    pub fn row_metadata(&self, row_id: &str, columns: &[&str]) -> Result<Vec<(String, &[Candidate])>, ModelError> {
        let row_slot = *self
            .row_slots
            .get(row_id)
            .ok_or_else(|| ModelError::RowNotFound(row_id.to_string()))?;
        let row = &self.rows[row_slot];

        let mut out = Vec::with_capacity(columns.len());
        for &column in columns {
            let Some(cell) = self.column_slots.get(column).and_then(|slot| row.cells.get(slot)) else {
                tracing::warn!(row = row_id, column, "no cell for column, skipping");
                continue;
            };
            if cell.metadata.is_empty() {
                tracing::debug!(row = row_id, column, "cell has no candidates");
                continue;
            }
            out.push((column.to_string(), cell.metadata.as_slice()));
        }
        Ok(out)
    }

    /// Store a cell, overwriting any previous one.
    ///
    /// The cell id is rewritten to the `row$column` join key. Fails if the
    /// row or column is absent; rows are never created here.
    pub fn set_cell(&mut self, row_id: &str, column_id: &str, mut cell: Cell) -> Result<(), ModelError> {
        let (row_slot, column_slot) = self.slots(row_id, column_id)?;
        cell.id = CellKey::format(row_id, column_id);
        self.rows[row_slot].cells.insert(column_slot, cell);
        self.journal.push(Mutation::CellWritten {
            row: row_id.to_string(),
            column: column_id.to_string(),
        });
        Ok(())
    }

    /// Drop every cell of a column, keeping the column. Returns how many
    /// cells were removed.
    pub fn clear_column(&mut self, column_id: &str) -> Result<usize, ModelError> {
        let slot = *self
            .column_slots
            .get(column_id)
            .ok_or_else(|| ModelError::ColumnNotFound(column_id.to_string()))?;
        let removed = self
            .rows
            .iter_mut()
            .filter_map(|row| row.cells.remove(&slot))
            .count();
        self.journal.push(Mutation::ColumnCleared {
            column: column_id.to_string(),
        });
        Ok(removed)
    }

    /// Every stored cell of a column, in row order.
    pub fn cells_in_column<'a>(
        &'a self,
        column_id: &str,
    ) -> Result<impl Iterator<Item = (&'a str, &'a Cell)>, ModelError> {
        let slot = *self
            .column_slots
            .get(column_id)
            .ok_or_else(|| ModelError::ColumnNotFound(column_id.to_string()))?;
        Ok(self
            .rows
            .iter()
            .filter_map(move |row| row.cells.get(&slot).map(|cell| (row.id.as_str(), cell))))
    }

    /// Every stored cell, row-major.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows.iter().flat_map(|row| row.cells.values())
    }

    fn slots(&self, row_id: &str, column_id: &str) -> Result<(RowSlot, ColumnSlot), ModelError> {
        let row_slot = *self
            .row_slots
            .get(row_id)
            .ok_or_else(|| ModelError::RowNotFound(row_id.to_string()))?;
        let column_slot = *self
            .column_slots
            .get(column_id)
            .ok_or_else(|| ModelError::ColumnNotFound(column_id.to_string()))?;
        Ok((row_slot, column_slot))
    }

    // ── Counters ────────────────────────────────────────────────────

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cells(&self) -> usize {
        self.rows.iter().map(Row::cell_count).sum()
    }

    /// Last stored aggregate summary. May be stale until the next
    /// [`apply_summary`](Self::apply_summary).
    pub fn summary(&self) -> &TableScoreSummary {
        &self.summary
    }

    pub fn apply_summary(&mut self, summary: TableScoreSummary) {
        self.summary = summary;
    }

    // ── Journal ─────────────────────────────────────────────────────

    pub fn journal(&self) -> &[Mutation] {
        &self.journal
    }

    pub fn drain_journal(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.journal)
    }
}
