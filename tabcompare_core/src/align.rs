use crate::dataset::TabularDataset;
use std::collections::{BTreeSet, HashMap, HashSet};
use tabcompare_common::{CellValue, ColumnOrder};
use tracing::debug;

/// Two datasets reshaped onto the same ordered column list
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaAlignment {
    left: TabularDataset,
    right: TabularDataset,
}

impl SchemaAlignment {
    pub fn columns(&self) -> &[String] {
        self.left.columns()
    }

    pub fn left(&self) -> &TabularDataset {
        &self.left
    }

    pub fn right(&self) -> &TabularDataset {
        &self.right
    }

    pub fn into_parts(self) -> (TabularDataset, TabularDataset) {
        (self.left, self.right)
    }
}

/// Reshapes two datasets onto the union of their column sets
///
/// Columns match by exact name only. A column missing from one side is added
/// to every row of that side as [`CellValue::Absent`]; no value is ever dropped.
pub struct SchemaAligner {
    order: ColumnOrder,
}

impl SchemaAligner {
    pub fn new() -> Self {
        Self {
            order: ColumnOrder::default(),
        }
    }

    pub fn with_order(mut self, order: ColumnOrder) -> Self {
        self.order = order;
        self
    }

    /// Union of both column lists in this aligner's order
    pub fn union_columns(&self, left: &[String], right: &[String]) -> Vec<String> {
        match self.order {
            ColumnOrder::FirstSeen => {
                let mut seen = HashSet::new();
                left.iter()
                    .chain(right.iter())
                    .filter(|name| seen.insert(name.as_str()))
                    .cloned()
                    .collect()
            }
            ColumnOrder::Sorted => left
                .iter()
                .chain(right.iter())
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }

    pub fn align(&self, left: TabularDataset, right: TabularDataset) -> SchemaAlignment {
        let columns = self.union_columns(left.columns(), right.columns());
        debug!(
            "Aligning {} + {} columns onto {}",
            left.column_count(),
            right.column_count(),
            columns.len()
        );

        SchemaAlignment {
            left: reindex(left, &columns),
            right: reindex(right, &columns),
        }
    }
}

impl Default for SchemaAligner {
    fn default() -> Self {
        Self::new()
    }
}

fn reindex(dataset: TabularDataset, columns: &[String]) -> TabularDataset {
    if dataset.columns() == columns {
        return dataset;
    }

    let (source, old_columns, rows) = dataset.into_parts();
    let old_positions: HashMap<&str, usize> = old_columns
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    let mapping: Vec<Option<usize>> = columns
        .iter()
        .map(|name| old_positions.get(name.as_str()).copied())
        .collect();

    let rows = rows
        .into_iter()
        .map(|mut row| {
            mapping
                .iter()
                .map(|position| match position {
                    Some(idx) => std::mem::replace(&mut row[*idx], CellValue::Absent),
                    None => CellValue::Absent,
                })
                .collect()
        })
        .collect();

    TabularDataset::from_parts(source, columns.to_vec(), rows)
}
