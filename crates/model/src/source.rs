//! Raw tabular input, before any reconciliation.

use crate::error::ModelError;
use crate::table::{Cell, Column, TableMeta, TableModel};

/// Supplies header names and row values for dataset import.
pub trait DataFrameSource {
    fn column_names(&self) -> Vec<String>;
    fn records(&self) -> Vec<Vec<String>>;
}

/// In-memory CSV source.
#[derive(Debug, Clone)]
pub struct CsvSource {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl CsvSource {
    /// Parse CSV text with a header row.
    pub fn from_csv(data: &str) -> Result<Self, ModelError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());

        let headers = reader.headers()?.iter().map(str::to_string).collect();

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, records })
    }
}

impl DataFrameSource for CsvSource {
    fn column_names(&self) -> Vec<String> {
        self.headers.clone()
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.records.clone()
    }
}

impl TableModel {
    /// Build an unannotated table: rows `r0..rN`, every column `empty`.
    ///
    /// Short records leave the trailing cells absent.
    pub fn from_source(meta: TableMeta, source: &dyn DataFrameSource) -> Result<Self, ModelError> {
        let mut table = TableModel::new(meta);
        let names = source.column_names();
        for name in &names {
            table.upsert_column(name, Column::new(name.as_str()));
        }

        for (i, record) in source.records().into_iter().enumerate() {
            let row_id = format!("r{i}");
            table.push_row(row_id.as_str())?;
            for (name, value) in names.iter().zip(record) {
                table.set_cell(&row_id, name, Cell::labeled(value))?;
            }
        }

        table.drain_journal();
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnStatus;

    #[test]
    fn import_csv() {
        let csv = "\
City,Date
Rome,2024-03-01
Turin,2024-03-02
";
        let source = CsvSource::from_csv(csv).unwrap();
        let t = TableModel::from_source(TableMeta::default(), &source).unwrap();

        assert_eq!(t.column_ids().collect::<Vec<_>>(), ["City", "Date"]);
        assert_eq!(t.row_ids().collect::<Vec<_>>(), ["r0", "r1"]);
        let cell = t.get_cell("r1", "City").unwrap().unwrap();
        assert_eq!(cell.label, "Turin");
        assert_eq!(cell.id, "r1$City");
        assert!(t.columns().all(|c| c.status == ColumnStatus::Empty));
        assert!(t.journal().is_empty());
    }

    #[test]
    fn ragged_csv_is_an_error() {
        let csv = "City,Date\nRome\n";
        assert!(CsvSource::from_csv(csv).is_err());
    }
}
