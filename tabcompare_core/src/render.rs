use crate::reconcile::{HighlightedRowSet, ReconcileSummary};
use crate::report::{ComparisonReport, Side};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabcompare_common::TabCompareError;
use tracing::debug;

/// Turns a report into an artifact inside a session directory
pub trait ReportRenderer: Send + Sync {
    /// File name of the artifact within the session
    fn artifact_name(&self) -> &str;

    /// Write the artifact and return its path
    fn render(&self, report: &ComparisonReport, session_dir: &Path)
        -> Result<PathBuf, TabCompareError>;
}

#[derive(Serialize)]
struct RenderedSide<'a> {
    path: String,
    sheet_index: usize,
    sheet_name: &'a str,
    original_rows: usize,
    rows: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct RenderedReport<'a> {
    title: &'a str,
    columns: &'a [String],
    left: RenderedSide<'a>,
    right: RenderedSide<'a>,
    highlighted_rows: &'a HighlightedRowSet,
    summary: &'a ReconcileSummary,
}

/// Writes `comparison_result.json` with display-ready rows
pub struct JsonReportRenderer {
    artifact_name: String,
}

impl JsonReportRenderer {
    pub fn new() -> Self {
        Self {
            artifact_name: "comparison_result.json".to_string(),
        }
    }

    pub fn with_artifact_name(mut self, name: impl Into<String>) -> Self {
        self.artifact_name = name.into();
        self
    }

    fn side<'a>(report: &'a ComparisonReport, side: Side) -> RenderedSide<'a> {
        let input = report.input(side);
        let original_rows = match side {
            Side::Left => report.pair().left_original_rows(),
            Side::Right => report.pair().right_original_rows(),
        };
        RenderedSide {
            path: input.path.to_string_lossy().to_string(),
            sheet_index: input.sheet_index,
            sheet_name: &input.sheet_name,
            original_rows,
            rows: report.display_rows(side),
        }
    }
}

impl Default for JsonReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRenderer for JsonReportRenderer {
    fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    fn render(
        &self,
        report: &ComparisonReport,
        session_dir: &Path,
    ) -> Result<PathBuf, TabCompareError> {
        let rendered = RenderedReport {
            title: report.title(),
            columns: report.columns(),
            left: Self::side(report, Side::Left),
            right: Self::side(report, Side::Right),
            highlighted_rows: report.highlighted(),
            summary: report.summary(),
        };

        let data = serde_json::to_vec_pretty(&rendered)
            .map_err(|e| TabCompareError::Serialization(e.to_string()))?;

        let path = session_dir.join(&self.artifact_name);
        fs::write(&path, data)
            .map_err(|e| TabCompareError::storage(format!("write {}", path.display()), e))?;

        debug!("Rendered report to {}", path.display());
        Ok(path)
    }
}
