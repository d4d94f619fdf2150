use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// A row id was referenced that the table does not contain.
    #[error("row not found: {0}")]
    RowNotFound(String),
    /// A column id was referenced that the table does not contain.
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    /// Dataset import tried to create the same row twice.
    #[error("duplicate row id: {0}")]
    DuplicateRow(String),
    /// Raw source data could not be read.
    #[error("source read error: {0}")]
    Source(String),
}

impl From<csv::Error> for ModelError {
    fn from(err: csv::Error) -> Self {
        Self::Source(err.to_string())
    }
}
