//! Cell join key.
//!
//! Every cell id is `"{rowId}${columnId}"`. Reconciliation and extension
//! results are routed back into rows through this key.

/// Row/column pair decoded from a cell join key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub row: String,
    pub column: String,
}

impl CellKey {
    pub const SEPARATOR: char = '$';

    pub fn new(row: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            row: row.into(),
            column: column.into(),
        }
    }

    /// Build the join key string for a row/column pair.
    #[inline]
    pub fn format(row: &str, column: &str) -> String {
        format!("{row}{}{column}", Self::SEPARATOR)
    }

    /// Split a join key at the first `$`.
    ///
    /// Returns `None` when there is no separator or either half is empty.
    pub fn parse(key: &str) -> Option<Self> {
        let (row, column) = key.split_once(Self::SEPARATOR)?;
        if row.is_empty() || column.is_empty() {
            return None;
        }
        Some(Self::new(row, column))
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.row, Self::SEPARATOR, self.column)
    }
}
