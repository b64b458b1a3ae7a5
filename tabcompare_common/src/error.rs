use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabCompareError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid document format: {0}")]
    Format(String),

    #[error("Invalid document sheet number: {0}")]
    Range(String),

    #[error("Document is blank: {0}")]
    EmptyDataset(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Diff engine error: {0}")]
    Collaborator(String),
}

pub type Result<T> = std::result::Result<T, TabCompareError>;

/// Caller-facing classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input file or session missing
    NotFound,
    /// File is not the expected format or has the wrong extension
    Format,
    /// Requested sheet is outside `[1, sheet_count]`
    Range,
    /// Selected sheet carries no data
    EmptyDataset,
    /// Workspace allocation, copy or removal failed
    Storage,
    /// Configuration, serialization or collaborator failure
    Internal,
}

impl TabCompareError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TabCompareError::NotFound(_) => ErrorKind::NotFound,
            TabCompareError::Format(_) => ErrorKind::Format,
            TabCompareError::Range(_) => ErrorKind::Range,
            TabCompareError::EmptyDataset(_) => ErrorKind::EmptyDataset,
            TabCompareError::Storage(_) | TabCompareError::Io(_) => ErrorKind::Storage,
            TabCompareError::Config(_)
            | TabCompareError::Serialization(_)
            | TabCompareError::Collaborator(_) => ErrorKind::Internal,
        }
    }

    /// Wrap an I/O failure at the storage layer with context
    pub fn storage(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        TabCompareError::Storage(format!("{}: {}", context, err))
    }
}
