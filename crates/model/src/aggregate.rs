//! Score aggregation.
//!
//! Pure functions over a table snapshot. Column and table counters are
//! derived here and nowhere else.

use std::collections::HashSet;

use serde::Serialize;

use crate::candidate::{AnnotationMeta, Candidate, MatchInfo};
use crate::error::ModelError;
use crate::table::TableModel;

/// Table-level bounds used when no cell is annotated.
pub const EMPTY_MIN_META_SCORE: f64 = 0.0;
pub const EMPTY_MAX_META_SCORE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnScoreSummary {
    pub lowest_score: f64,
    pub highest_score: f64,
    /// False iff any annotated cell in the column is a mismatch.
    pub match_value: bool,
    pub annotated_cells: usize,
}

impl ColumnScoreSummary {
    /// Column-level annotation derived from this summary.
    pub fn to_annotation(&self, reason: Option<&str>) -> AnnotationMeta {
        AnnotationMeta {
            annotated: self.annotated_cells > 0,
            match_info: MatchInfo {
                value: self.match_value,
                reason: reason.map(str::to_string),
            },
            lowest_score: self.lowest_score,
            highest_score: self.highest_score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableScoreSummary {
    pub n_cells_reconciliated: usize,
    pub min_meta_score: f64,
    pub max_meta_score: f64,
}

impl Default for TableScoreSummary {
    fn default() -> Self {
        Self {
            n_cells_reconciliated: 0,
            min_meta_score: EMPTY_MIN_META_SCORE,
            max_meta_score: EMPTY_MAX_META_SCORE,
        }
    }
}

/// Cell-level annotation rule.
///
/// `match.value` is true if any candidate matched; the score bounds are the
/// min/max of the candidates' own scores. `None` for an empty list.
pub fn annotate_candidates(candidates: &[Candidate]) -> Option<AnnotationMeta> {
    let first = candidates.first()?;
    let (lowest, highest) = candidates
        .iter()
        .fold((first.score, first.score), |(lo, hi), c| (lo.min(c.score), hi.max(c.score)));

    Some(AnnotationMeta {
        annotated: true,
        match_info: MatchInfo {
            value: candidates.iter().any(|c| c.matched),
            reason: None,
        },
        lowest_score: lowest,
        highest_score: highest,
    })
}

/// Summarize the annotated cells of one column.
///
/// Cells without an annotation are skipped, not counted as mismatches.
pub fn recompute_column(table: &TableModel, column_id: &str) -> Result<ColumnScoreSummary, ModelError> {
    let mut annotated = 0usize;
    let mut lowest = f64::INFINITY;
    let mut highest = f64::NEG_INFINITY;
    let mut match_value = true;

    for (_, cell) in table.cells_in_column(column_id)? {
        let Some(meta) = cell.annotation_meta.as_ref().filter(|m| m.annotated) else {
            continue;
        };
        annotated += 1;
        lowest = lowest.min(meta.lowest_score);
        highest = highest.max(meta.highest_score);
        match_value &= meta.match_info.value;
    }

    if annotated == 0 {
        return Ok(ColumnScoreSummary {
            lowest_score: 0.0,
            highest_score: 0.0,
            match_value: true,
            annotated_cells: 0,
        });
    }

    Ok(ColumnScoreSummary {
        lowest_score: lowest,
        highest_score: highest,
        match_value,
        annotated_cells: annotated,
    })
}

/// Count annotated cells and bound their `lowestScore` across the table.
pub fn recompute_table(table: &TableModel) -> TableScoreSummary {
    let lowest_scores: Vec<f64> = table
        .cells()
        .filter_map(|cell| cell.annotation_meta.as_ref())
        .filter(|meta| meta.annotated)
        .map(|meta| meta.lowest_score)
        .collect();

    if lowest_scores.is_empty() {
        return TableScoreSummary::default();
    }

    TableScoreSummary {
        n_cells_reconciliated: lowest_scores.len(),
        min_meta_score: lowest_scores.iter().copied().fold(f64::INFINITY, f64::min),
        max_meta_score: lowest_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Recompute and store the table summary in one step.
pub fn refresh(table: &mut TableModel) -> TableScoreSummary {
    let summary = recompute_table(table);
    table.apply_summary(summary);
    summary
}

// ── Coverage ────────────────────────────────────────────────────

/// How much of a column reconciliation or extension filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnCoverage {
    pub column: String,
    /// Cells with a non-empty label.
    pub labeled_cells: usize,
    /// Distinct non-empty labels.
    pub unique_labels: usize,
    /// Distinct candidate ids across all cells.
    pub unique_entities: usize,
    /// `labeled_cells` as a percentage of the table's rows; 0 for an empty table.
    pub percent_labeled: f64,
}

/// Coverage counters for each requested column, in request order.
///
/// Reconciled columns are best read through `unique_entities`, extended
/// ones through `unique_labels`.
pub fn column_coverage(table: &TableModel, columns: &[&str]) -> Result<Vec<ColumnCoverage>, ModelError> {
    let n_rows = table.n_rows();
    columns
        .iter()
        .map(|&column| {
            let mut labeled_cells = 0usize;
            let mut labels = HashSet::new();
            let mut entities = HashSet::new();
            for (_, cell) in table.cells_in_column(column)? {
                if !cell.label.is_empty() {
                    labeled_cells += 1;
                    labels.insert(cell.label.as_str());
                }
                entities.extend(cell.metadata.iter().map(|c| c.id.as_str()));
            }
            let percent_labeled = if n_rows == 0 {
                0.0
            } else {
                labeled_cells as f64 / n_rows as f64 * 100.0
            };
            Ok(ColumnCoverage {
                column: column.to_string(),
                labeled_cells,
                unique_labels: labels.len(),
                unique_entities: entities.len(),
                percent_labeled,
            })
        })
        .collect()
}
