//! `semtab-model`: Annotated table model.
//!
//! Pure data crate: the in-memory table (columns, rows, cells, candidate
//! metadata) and the score aggregation that keeps its counters consistent.
//! No HTTP, no wire-format knowledge beyond serde field names.

pub mod aggregate;
pub mod candidate;
pub mod cell_key;
pub mod error;
pub mod source;
pub mod table;

mod serde_ids;

pub use aggregate::{column_coverage, ColumnCoverage, ColumnScoreSummary, TableScoreSummary};
pub use candidate::{canonical_candidate, AnnotationMeta, Candidate, EntityName, EntityType, MatchInfo};
pub use cell_key::CellKey;
pub use error::ModelError;
pub use source::{CsvSource, DataFrameSource};
pub use table::{
    de_column_kind, Cell, Column, ColumnKind, ColumnStatus, ContextEntry, Mutation, Row, TableMeta,
    TableModel, ColumnSlot, RowSlot,
};

pub use serde_ids::{de_label, de_string_or_number};
