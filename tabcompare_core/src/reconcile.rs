use crate::align::SchemaAlignment;
use crate::dataset::TabularDataset;
use serde::Serialize;
use std::collections::BTreeSet;
use tabcompare_common::CellValue;
use tracing::debug;

/// Two datasets with identical columns and identical row counts
///
/// Only [`RowReconciler`] builds these, so the shape guarantee always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedPair {
    left: TabularDataset,
    right: TabularDataset,
    left_original_rows: usize,
    right_original_rows: usize,
}

impl AlignedPair {
    pub fn left(&self) -> &TabularDataset {
        &self.left
    }

    pub fn right(&self) -> &TabularDataset {
        &self.right
    }

    pub fn columns(&self) -> &[String] {
        self.left.columns()
    }

    /// Common row count after padding
    pub fn row_count(&self) -> usize {
        self.left.row_count()
    }

    /// Row count of the left side before padding
    pub fn left_original_rows(&self) -> usize {
        self.left_original_rows
    }

    /// Row count of the right side before padding
    pub fn right_original_rows(&self) -> usize {
        self.right_original_rows
    }
}

/// Row positions flagged for emphasis, 0-based over the padded rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HighlightedRowSet(BTreeSet<usize>);

impl HighlightedRowSet {
    pub fn contains(&self, row: usize) -> bool {
        self.0.contains(&row)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Positions in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

impl FromIterator<usize> for HighlightedRowSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Row counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Rows after padding
    pub total_rows: usize,
    /// Positions present on both sides with identical cells
    pub identical_rows: usize,
    /// Positions present on both sides with at least one differing cell
    pub different_rows: usize,
    /// Positions present only on the left (right side padded)
    pub left_only_rows: usize,
    /// Positions present only on the right (left side padded)
    pub right_only_rows: usize,
}

/// Output of [`RowReconciler::reconcile`]
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub pair: AlignedPair,
    pub highlighted: HighlightedRowSet,
    pub summary: ReconcileSummary,
}

/// Equalizes row counts and flags differing rows, strictly by position
///
/// Rows are never matched by content: an inserted row near the top of one side
/// shifts every later row and flags all of them.
pub struct RowReconciler;

impl RowReconciler {
    pub fn new() -> Self {
        Self
    }

    pub fn reconcile(&self, alignment: SchemaAlignment) -> Reconciliation {
        let (left, right) = alignment.into_parts();
        let left_len = left.row_count();
        let right_len = right.row_count();
        let total = left_len.max(right_len);
        let shared = left_len.min(right_len);

        let left = pad(left, total);
        let right = pad(right, total);

        let mut highlighted = BTreeSet::new();
        let mut summary = ReconcileSummary {
            total_rows: total,
            ..ReconcileSummary::default()
        };

        for (idx, (l, r)) in left.rows().iter().zip(right.rows()).enumerate() {
            if idx >= shared {
                // Existence asymmetry, flagged regardless of cell values
                highlighted.insert(idx);
                if idx < left_len {
                    summary.left_only_rows += 1;
                } else {
                    summary.right_only_rows += 1;
                }
            } else if l != r {
                highlighted.insert(idx);
                summary.different_rows += 1;
            } else {
                summary.identical_rows += 1;
            }
        }

        debug!(
            "Reconciled {} rows: {} identical, {} different, {} left-only, {} right-only",
            summary.total_rows,
            summary.identical_rows,
            summary.different_rows,
            summary.left_only_rows,
            summary.right_only_rows
        );

        Reconciliation {
            pair: AlignedPair {
                left,
                right,
                left_original_rows: left_len,
                right_original_rows: right_len,
            },
            highlighted: HighlightedRowSet(highlighted),
            summary,
        }
    }
}

impl Default for RowReconciler {
    fn default() -> Self {
        Self::new()
    }
}

fn pad(dataset: TabularDataset, rows: usize) -> TabularDataset {
    let missing = rows.saturating_sub(dataset.row_count());
    if missing == 0 {
        return dataset;
    }

    let (source, columns, mut data) = dataset.into_parts();
    let width = columns.len();
    data.extend((0..missing).map(|_| vec![CellValue::Absent; width]));
    TabularDataset::from_parts(source, columns, data)
}
