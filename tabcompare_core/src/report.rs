use crate::dataset::{DatasetSource, TabularDataset};
use crate::reconcile::{AlignedPair, HighlightedRowSet, Reconciliation, ReconcileSummary};
use serde::Serialize;
use std::path::PathBuf;
use tabcompare_common::CellValue;

/// Shown in place of absent and empty cells
pub const MISSING_PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Finished tabular comparison, ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    title: String,
    left_input: DatasetSource,
    right_input: DatasetSource,
    pair: AlignedPair,
    highlighted: HighlightedRowSet,
    summary: ReconcileSummary,
}

impl ComparisonReport {
    pub fn new(title: impl Into<String>, reconciliation: Reconciliation) -> Self {
        let Reconciliation {
            pair,
            highlighted,
            summary,
        } = reconciliation;

        Self {
            title: title.into(),
            left_input: pair.left().source().clone(),
            right_input: pair.right().source().clone(),
            pair,
            highlighted,
            summary,
        }
    }

    /// Report the caller's paths rather than the session copies
    pub fn with_input_paths(mut self, left: PathBuf, right: PathBuf) -> Self {
        self.left_input.path = left;
        self.right_input.path = right;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn input(&self, side: Side) -> &DatasetSource {
        match side {
            Side::Left => &self.left_input,
            Side::Right => &self.right_input,
        }
    }

    pub fn pair(&self) -> &AlignedPair {
        &self.pair
    }

    pub fn dataset(&self, side: Side) -> &TabularDataset {
        match side {
            Side::Left => self.pair.left(),
            Side::Right => self.pair.right(),
        }
    }

    pub fn columns(&self) -> &[String] {
        self.pair.columns()
    }

    pub fn highlighted(&self) -> &HighlightedRowSet {
        &self.highlighted
    }

    pub fn summary(&self) -> &ReconcileSummary {
        &self.summary
    }

    pub fn has_differences(&self) -> bool {
        !self.highlighted.is_empty()
    }

    /// Rows of one side as display strings, `N/A` for absent or empty cells
    pub fn display_rows(&self, side: Side) -> Vec<Vec<String>> {
        self.dataset(side)
            .rows()
            .iter()
            .map(|row| row.iter().map(display_cell).collect())
            .collect()
    }
}

fn display_cell(cell: &CellValue) -> String {
    match cell {
        CellValue::Absent | CellValue::Null => MISSING_PLACEHOLDER.to_string(),
        other => other.to_string(),
    }
}
