pub mod workspace;
pub mod dataset;
pub mod align;
pub mod reconcile;
pub mod report;
pub mod render;
pub mod structural;
pub mod service;

#[cfg(test)]
mod test_support;

pub use workspace::{Session, WorkspaceStore};
pub use dataset::{DatasetLoader, DatasetSource, RowView, SheetRef, TabularDataset};
pub use align::{SchemaAligner, SchemaAlignment};
pub use reconcile::{AlignedPair, HighlightedRowSet, ReconcileSummary, Reconciliation, RowReconciler};
pub use report::{ComparisonReport, Side, MISSING_PLACEHOLDER};
pub use render::{JsonReportRenderer, ReportRenderer};
pub use structural::{is_docx_file, DocumentNormalizer, LineDiffEngine, NormalizedDocument, StructuralDiffEngine};
pub use service::{
    ComparisonFailure, ComparisonOutcome, ComparisonService, ComparisonStage, RemovalOutcome,
    StructuralRequest, TabularRequest,
};
