use crate::align::SchemaAligner;
use crate::dataset::{DatasetLoader, SheetRef};
use crate::reconcile::RowReconciler;
use crate::render::{JsonReportRenderer, ReportRenderer};
use crate::report::ComparisonReport;
use crate::structural::{DocumentNormalizer, LineDiffEngine, StructuralDiffEngine};
use crate::workspace::WorkspaceStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabcompare_common::{AppConfig, SessionId, SessionState, TabCompareError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Request states, in order
///
/// A request that fails leaves this sequence and ends as a
/// [`ComparisonFailure`], which records the last state reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStage {
    Validating,
    WorkspaceCreated,
    Populated,
    Loaded,
    Aligned,
    Reconciled,
    Reported,
}

impl fmt::Display for ComparisonStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComparisonStage::Validating => "validating",
            ComparisonStage::WorkspaceCreated => "workspace_created",
            ComparisonStage::Populated => "populated",
            ComparisonStage::Loaded => "loaded",
            ComparisonStage::Aligned => "aligned",
            ComparisonStage::Reconciled => "reconciled",
            ComparisonStage::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// A failed request
///
/// `stage` is the state the request was in when the error occurred. Any
/// session already created is left on disk and named in `session`; removing
/// it is up to the caller.
#[derive(Debug, Error)]
#[error("comparison failed in state {stage}: {error}")]
pub struct ComparisonFailure {
    pub stage: ComparisonStage,
    pub session: Option<SessionId>,
    #[source]
    pub error: TabCompareError,
}

fn first_sheet() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularRequest {
    pub source1: PathBuf,
    #[serde(default = "first_sheet")]
    pub sheet1: i64,
    pub source2: PathBuf,
    #[serde(default = "first_sheet")]
    pub sheet2: i64,
}

impl TabularRequest {
    pub fn new(source1: impl Into<PathBuf>, source2: impl Into<PathBuf>) -> Self {
        Self {
            source1: source1.into(),
            sheet1: 1,
            source2: source2.into(),
            sheet2: 1,
        }
    }

    /// 1-based sheet indexes; anything outside a file's sheet range fails
    /// validation with a `Range` error
    pub fn with_sheets(mut self, sheet1: i64, sheet2: i64) -> Self {
        self.sheet1 = sheet1;
        self.sheet2 = sheet2;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralRequest {
    pub source1: PathBuf,
    pub source2: PathBuf,
}

impl StructuralRequest {
    pub fn new(source1: impl Into<PathBuf>, source2: impl Into<PathBuf>) -> Self {
        Self {
            source1: source1.into(),
            source2: source2.into(),
        }
    }
}

/// Successful comparison
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonOutcome {
    pub session_id: SessionId,
    pub report_url: String,
    #[serde(skip)]
    pub artifact_path: PathBuf,
    /// Present for tabular comparisons
    #[serde(skip)]
    pub report: Option<ComparisonReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovalOutcome {
    pub message: String,
    #[serde(skip)]
    pub session_id: SessionId,
    /// Always `Deleted` once removal succeeded
    #[serde(skip)]
    pub state: SessionState,
}

struct RequestTracker {
    kind: &'static str,
    stage: ComparisonStage,
    session: Option<SessionId>,
}

impl RequestTracker {
    fn new(kind: &'static str) -> Self {
        debug!("{} comparison: {}", kind, ComparisonStage::Validating);
        Self {
            kind,
            stage: ComparisonStage::Validating,
            session: None,
        }
    }

    fn advance(&mut self, next: ComparisonStage) {
        debug!("{} comparison: {} -> {}", self.kind, self.stage, next);
        self.stage = next;
    }

    fn attach(&mut self, session: SessionId) {
        self.session = Some(session);
        self.advance(ComparisonStage::WorkspaceCreated);
    }

    fn fail(&self, error: TabCompareError) -> ComparisonFailure {
        match self.session {
            Some(id) => warn!(
                "{} comparison failed in state {} (session {} left in place): {}",
                self.kind, self.stage, id, error
            ),
            None => warn!(
                "{} comparison failed in state {}: {}",
                self.kind, self.stage, error
            ),
        }
        ComparisonFailure {
            stage: self.stage,
            session: self.session,
            error,
        }
    }
}

/// Runs comparison requests end to end
///
/// Shareable across threads; each request gets its own session.
pub struct ComparisonService {
    store: WorkspaceStore,
    loader: DatasetLoader,
    aligner: SchemaAligner,
    reconciler: RowReconciler,
    renderer: Box<dyn ReportRenderer>,
    normalizer: DocumentNormalizer,
    structural: Box<dyn StructuralDiffEngine>,
    base_url: String,
    report_title: String,
}

impl ComparisonService {
    pub fn new(store: WorkspaceStore) -> Self {
        let defaults = AppConfig::default();
        Self {
            store,
            loader: DatasetLoader::new(),
            aligner: SchemaAligner::new(),
            reconciler: RowReconciler::new(),
            renderer: Box::new(JsonReportRenderer::new()),
            normalizer: DocumentNormalizer::new(),
            structural: Box::new(LineDiffEngine::new()),
            base_url: defaults.base_url,
            report_title: defaults.report_title,
        }
    }

    /// Build a service from configuration rooted at `workspace_root`
    pub fn from_config(config: &AppConfig, workspace_root: PathBuf) -> Result<Self, TabCompareError> {
        let store = WorkspaceStore::open(workspace_root)?;
        Ok(Self::new(store)
            .with_loader(
                DatasetLoader::new().with_accepted_extensions(config.accepted_extensions.clone()),
            )
            .with_aligner(SchemaAligner::new().with_order(config.column_order))
            .with_base_url(config.base_url.clone())
            .with_report_title(config.report_title.clone()))
    }

    pub fn with_loader(mut self, loader: DatasetLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_aligner(mut self, aligner: SchemaAligner) -> Self {
        self.aligner = aligner;
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn ReportRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_structural_engine(mut self, engine: Box<dyn StructuralDiffEngine>) -> Self {
        self.structural = engine;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_report_title(mut self, title: impl Into<String>) -> Self {
        self.report_title = title.into();
        self
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    pub fn report_url(&self, session: &SessionId, artifact: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            session,
            artifact
        )
    }

    /// Compare one sheet of each of two spreadsheet files
    pub fn compare_tabular(
        &self,
        request: &TabularRequest,
    ) -> Result<ComparisonOutcome, ComparisonFailure> {
        let mut tracker = RequestTracker::new("tabular");

        self.loader
            .validate_pair(
                SheetRef::new(&request.source1, request.sheet1),
                SheetRef::new(&request.source2, request.sheet2),
            )
            .map_err(|e| tracker.fail(e))?;

        let mut session = self.store.create_session().map_err(|e| tracker.fail(e))?;
        tracker.attach(session.id());

        let copies = self
            .store
            .copy_into(&mut session, [request.source1.as_path(), request.source2.as_path()])
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(ComparisonStage::Populated);

        let (left, right) = rayon::join(
            || self.loader.load(&copies[0], request.sheet1),
            || self.loader.load(&copies[1], request.sheet2),
        );
        let left = left.map_err(|e| tracker.fail(e))?;
        let right = right.map_err(|e| tracker.fail(e))?;
        tracker.advance(ComparisonStage::Loaded);

        let alignment = self.aligner.align(left, right);
        tracker.advance(ComparisonStage::Aligned);

        let reconciliation = self.reconciler.reconcile(alignment);
        tracker.advance(ComparisonStage::Reconciled);

        let report = ComparisonReport::new(self.report_title.clone(), reconciliation)
            .with_input_paths(request.source1.clone(), request.source2.clone());
        let artifact_path = self
            .renderer
            .render(&report, session.path())
            .map_err(|e| tracker.fail(e))?;
        session.mark_rendered();
        tracker.advance(ComparisonStage::Reported);

        info!(
            "Session {}: {} of {} rows highlighted in {} ms",
            session.id(),
            report.highlighted().len(),
            report.summary().total_rows,
            session.elapsed_ms()
        );

        Ok(ComparisonOutcome {
            session_id: session.id(),
            report_url: self.report_url(&session.id(), self.renderer.artifact_name()),
            artifact_path,
            report: Some(report),
        })
    }

    /// Compare two `.docx` documents through the structural diff engine
    ///
    /// Goes `Validating -> WorkspaceCreated -> Populated -> Loaded -> Reported`;
    /// alignment and reconciliation belong to the engine.
    pub fn compare_structural(
        &self,
        request: &StructuralRequest,
    ) -> Result<ComparisonOutcome, ComparisonFailure> {
        let mut tracker = RequestTracker::new("structural");

        self.normalizer
            .validate_pair(&request.source1, &request.source2)
            .map_err(|e| tracker.fail(e))?;

        let mut session = self.store.create_session().map_err(|e| tracker.fail(e))?;
        tracker.attach(session.id());

        let copies = self
            .store
            .copy_into(&mut session, [request.source1.as_path(), request.source2.as_path()])
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(ComparisonStage::Populated);

        let left = self.normalizer.normalize(&copies[0]).map_err(|e| tracker.fail(e))?;
        let right = self.normalizer.normalize(&copies[1]).map_err(|e| tracker.fail(e))?;
        tracker.advance(ComparisonStage::Loaded);

        let rendered = self
            .structural
            .diff(&left, &right)
            .map_err(|e| tracker.fail(e))?;
        let artifact_path = write_artifact(session.path(), self.structural.artifact_name(), &rendered)
            .map_err(|e| tracker.fail(e))?;
        session.mark_rendered();
        tracker.advance(ComparisonStage::Reported);

        info!(
            "Session {}: structural diff written in {} ms",
            session.id(),
            session.elapsed_ms()
        );

        Ok(ComparisonOutcome {
            session_id: session.id(),
            report_url: self.report_url(&session.id(), self.structural.artifact_name()),
            artifact_path,
            report: None,
        })
    }

    pub fn remove_session(&self, session_id: &str) -> Result<RemovalOutcome, TabCompareError> {
        let id = self.store.remove_str(session_id)?;
        Ok(RemovalOutcome {
            message: format!("Session id {} removed successfully.", id),
            session_id: id,
            state: SessionState::Deleted,
        })
    }

    pub fn sweep_expired(&self, max_age: Duration) -> Result<Vec<SessionId>, TabCompareError> {
        self.store.sweep_expired(max_age)
    }
}

fn write_artifact(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, TabCompareError> {
    let path = dir.join(name);
    fs::write(&path, bytes)
        .map_err(|e| TabCompareError::storage(format!("write {}", path.display()), e))?;
    Ok(path)
}
