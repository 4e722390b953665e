//! Dataset identity and source metadata.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque dataset identifier. UUIDs keep registry keys stable across renames.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DatasetId(Uuid);

impl DatasetId {
    pub fn generate() -> Self {
        DatasetId(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(DatasetId)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Concrete input encoding of a source. Collapses to [`DatasetKind`] for
/// consumers that only care about tabular vs. image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Delimited text, comma or tab separated.
    Csv,
    /// A JSON array of objects, or JSON lines.
    Json,
    /// A directory of image files, one class per subdirectory.
    Images,
}

impl SourceFormat {
    pub fn kind(&self) -> DatasetKind {
        match self {
            SourceFormat::Csv | SourceFormat::Json => DatasetKind::Tabular,
            SourceFormat::Images => DatasetKind::Image,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Json => "json",
            SourceFormat::Images => "images",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Tabular,
    Image,
}

/// A named, versioned collection of tabular or image data. The version
/// history itself lives behind the registry; this record is the stable part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub source: PathBuf,
    pub format: SourceFormat,
    pub created_at: DateTime<Utc>,
    /// Size of the backing file, or total size of an image directory.
    pub source_bytes: u64,
}

impl Dataset {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>, format: SourceFormat) -> Self {
        Dataset {
            id: DatasetId::generate(),
            name: name.into(),
            source: source.into(),
            format,
            created_at: Utc::now(),
            source_bytes: 0,
        }
    }
}

/// Derives a display name from the source path when the caller supplies none.
pub fn default_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
