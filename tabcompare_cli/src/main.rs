use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tabcompare_common::{
    load_config, load_config_from, resolve_workspace_root, AppConfig, ErrorKind, SessionId,
    TabCompareError,
};
use tabcompare_core::{
    ComparisonFailure, ComparisonService, ComparisonStage, StructuralRequest, TabularRequest,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabcompare")]
#[command(author = "TabCompare Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Compare spreadsheets and Word documents inside isolated sessions", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding session workspaces
    #[arg(long, global = true)]
    workspace_root: Option<PathBuf>,

    /// Public prefix for report URLs
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Keep configuration and workspaces next to the binary
    #[arg(long, global = true)]
    portable: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare one sheet of each of two spreadsheet files
    CompareTabular {
        /// First spreadsheet
        source1: PathBuf,

        /// Second spreadsheet
        source2: PathBuf,

        /// Sheet of the first file (1-based)
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        sheet1: i64,

        /// Sheet of the second file (1-based)
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        sheet2: i64,
    },

    /// Compare two .docx documents
    CompareStructural {
        /// First document
        source1: PathBuf,

        /// Second document
        source2: PathBuf,
    },

    /// Delete a session and everything in it
    RemoveSession {
        /// Session id as printed by a compare command
        session_id: String,
    },

    /// Delete sessions older than the configured time-to-live
    Sweep {
        /// Override the configured session time-to-live
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

/// Printed on stdout when a command fails
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
    stage: Option<ComparisonStage>,
    session_id: Option<SessionId>,
}

impl From<TabCompareError> for ErrorBody {
    fn from(err: TabCompareError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            stage: None,
            session_id: None,
        }
    }
}

impl From<ComparisonFailure> for ErrorBody {
    fn from(failure: ComparisonFailure) -> Self {
        Self {
            kind: failure.error.kind(),
            message: failure.error.to_string(),
            stage: Some(failure.stage),
            session_id: failure.session,
        }
    }
}

impl From<anyhow::Error> for ErrorBody {
    fn from(err: anyhow::Error) -> Self {
        let kind = err
            .downcast_ref::<TabCompareError>()
            .map(TabCompareError::kind)
            .unwrap_or(ErrorKind::Internal);
        Self {
            kind,
            message: format!("{:#}", err),
            stage: None,
            session_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct SweepOutput {
    removed: Vec<SessionId>,
}

fn main() {
    // Logs go to stderr so stdout carries only JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(body) => {
            error!("{}", body.message);
            println!("{}", render_error(body));
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<String, ErrorBody> {
    let (config, workspace_root) = resolve_settings(&cli.global)?;
    info!("Using workspace root: {}", workspace_root.display());

    let service = ComparisonService::from_config(&config, workspace_root)?;

    let output = match cli.command {
        Commands::CompareTabular {
            source1,
            source2,
            sheet1,
            sheet2,
        } => {
            let request = TabularRequest::new(source1, source2).with_sheets(sheet1, sheet2);
            to_json(&service.compare_tabular(&request)?)?
        }
        Commands::CompareStructural { source1, source2 } => {
            let request = StructuralRequest::new(source1, source2);
            to_json(&service.compare_structural(&request)?)?
        }
        Commands::RemoveSession { session_id } => to_json(&service.remove_session(&session_id)?)?,
        Commands::Sweep { max_age_secs } => {
            let max_age = Duration::from_secs(max_age_secs.unwrap_or(config.session_ttl_secs));
            let removed = service.sweep_expired(max_age)?;
            info!("Swept {} expired sessions", removed.len());
            to_json(&SweepOutput { removed })?
        }
    };

    Ok(output)
}

/// Load the configuration file and apply command-line overrides
fn resolve_settings(global: &GlobalArgs) -> anyhow::Result<(AppConfig, PathBuf)> {
    let mut loaded = match &global.config {
        Some(path) => load_config_from(path.clone(), global.portable),
        None => load_config(global.portable),
    }
    .context("failed to load configuration")?;

    if let Some(root) = &global.workspace_root {
        loaded.config.workspace_root = Some(root.clone());
    }
    if let Some(base_url) = &global.base_url {
        loaded.config.base_url = base_url.clone();
    }

    let workspace_root =
        resolve_workspace_root(&loaded).context("failed to resolve workspace root")?;
    Ok((loaded.config, workspace_root))
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize output")
}

fn render_error(body: ErrorBody) -> String {
    let envelope = ErrorEnvelope { error: body };
    serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| {
        r#"{"error":{"kind":"internal","message":"failed to serialize error"}}"#.to_string()
    })
}
