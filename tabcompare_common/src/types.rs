use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Session identifier for a comparison workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a session workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Namespace allocated, nothing copied yet
    Created,
    /// Both input files copied in
    Populated,
    /// Comparison artifact written
    Rendered,
    /// Namespace removed
    Deleted,
}

/// A single cell of a tabular dataset
///
/// Equality is exact, including the variant: `Number(3.0)` never equals
/// `Text("3")`, and `Null` (an empty cell inside the sheet) never equals
/// `Absent` (no such column or no such row on this side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Explicit absent marker for aligned columns and padding rows
    Absent,
    /// Empty cell
    Null,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Spreadsheet date serial
    DateTime(f64),
    /// Spreadsheet error cell such as `#DIV/0!`
    Error(String),
}

impl CellValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, CellValue::Absent)
    }

    /// True for cells that carry data (not absent, not null, not an empty string)
    pub fn has_data(&self) -> bool {
        match self {
            CellValue::Absent | CellValue::Null => false,
            CellValue::Text(s) => !s.is_empty(),
            _ => true,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Absent | CellValue::Null => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::DateTime(serial) => write!(f, "{}", serial),
            CellValue::Error(e) => f.write_str(e),
        }
    }
}

/// How the union of two column sets is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnOrder {
    /// Left columns in order, then right-only columns in order
    #[default]
    FirstSeen,
    /// Lexicographic by column name
    Sorted,
}

fn default_base_url() -> String {
    "http://localhost:8000/static".to_string()
}

fn default_accepted_extensions() -> Vec<String> {
    ["xlsx", "xlsm", "xlsb", "xls", "ods", "csv"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_report_title() -> String {
    "Excel Document Comparison".to_string()
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding one sub-directory per session
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    /// Public prefix under which session directories are served
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// File extensions accepted for tabular comparison (lowercase, no dot)
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,

    /// Column ordering of aligned datasets
    #[serde(default)]
    pub column_order: ColumnOrder,

    /// Sessions older than this are removed by `sweep`
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Title written into tabular reports
    #[serde(default = "default_report_title")]
    pub report_title: String,

    /// Enable portable mode (config alongside binary)
    #[serde(default)]
    pub portable_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            base_url: default_base_url(),
            accepted_extensions: default_accepted_extensions(),
            column_order: ColumnOrder::default(),
            session_ttl_secs: default_session_ttl_secs(),
            report_title: default_report_title(),
            portable_mode: false,
        }
    }
}
