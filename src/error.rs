//! Domain errors for the dataset versioning core.
//!
//! Every file-parsing failure is translated into [`DatasetError::UnreadableDataset`]
//! at the schema-inference boundary; raw I/O errors never escape it. A refresh
//! that detects no change is *not* an error — see
//! [`RefreshOutcome`](crate::version::RefreshOutcome).

use std::path::PathBuf;

use thiserror::Error;

use crate::dataset::DatasetId;

pub type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// The source file or directory is missing, corrupt, or empty.
    #[error("cannot read dataset source {path:?}: {reason}")]
    UnreadableDataset { path: PathBuf, reason: String },

    /// An initial version was requested for a dataset that already has history.
    #[error("dataset '{name}' already has a recorded version history")]
    DuplicateDataset { name: String },

    /// A refresh was attempted against a source path that no longer exists.
    #[error("source {path:?} for dataset '{name}' no longer exists")]
    SourceMissing { name: String, path: PathBuf },

    /// The path does not resolve to any supported source format.
    #[error("unsupported source format for {path:?}")]
    UnsupportedFormat { path: PathBuf },

    /// No dataset is registered under the given identifier.
    #[error("no dataset registered under id {id}")]
    UnknownDataset { id: DatasetId },

    /// The registry collaborator failed to persist or load a record.
    #[error("registry failure: {0}")]
    Registry(String),
}

impl DatasetError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DatasetError::UnreadableDataset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn registry(err: impl ToString) -> Self {
        DatasetError::Registry(err.to_string())
    }
}
