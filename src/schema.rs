//! Schema model and type inference.
//!
//! This module owns [`SchemaSnapshot`] (the structural description of one
//! dataset version), the [`ColumnType`] tagged variant, and the inference
//! engine that samples raw sources to classify columns. The column type is
//! decided exactly once, here; downstream consumers never re-infer it.
//!
//! ## Responsibilities
//!
//! - Delimited inference: header handling, synthetic names, type sampling
//!   with configurable sample size (default 2 000 rows), exact row counts
//! - JSON inference: array-of-objects and JSON-lines sources, column union
//!   in first-seen key order
//! - Image inference: header probes over a sample of files, class labels
//!   from subdirectory names
//! - Translation of every parse/I-O failure into `UnreadableDataset`

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::anyhow;
use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};

use crate::{
    data,
    dataset::SourceFormat,
    error::{DatasetError, Result},
    image::{self, ImageFormat},
    io_utils,
};

/// Default number of rows sampled for type classification. Zero means a full
/// scan. Row counts are always exact regardless of the sample size.
pub const DEFAULT_SAMPLE_ROWS: usize = 2_000;

/// Number of image files probed when deriving common dimensions.
const IMAGE_PROBE_SAMPLE: usize = 100;

/// Distinct sample values tracked per column before the column is considered
/// free-form text.
const DISTINCT_SAMPLE_CAP: usize = 200;

/// A column with at most this many distinct sampled values is categorical.
const CATEGORICAL_MAX_CLASSES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Text,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
            ColumnType::Text => "text",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["numeric", "categorical", "text"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "numeric" => Ok(ColumnType::Numeric),
            "categorical" => Ok(ColumnType::Categorical),
            "text" => Ok(ColumnType::Text),
            other => Err(anyhow!(
                "Unknown column type '{other}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub datatype: ColumnType,
}

/// Structural description of an image directory: the most common probed
/// header values plus the class labels found in subdirectory names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSchema {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub format: ImageFormat,
    pub classes: Vec<String>,
}

/// Immutable structural snapshot of one dataset version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SchemaSnapshot {
    Tabular {
        columns: Vec<ColumnDef>,
        row_count: u64,
    },
    Image {
        image: ImageSchema,
        item_count: u64,
    },
}

impl SchemaSnapshot {
    /// Rows for tabular sources, files for image sources.
    pub fn item_count(&self) -> u64 {
        match self {
            SchemaSnapshot::Tabular { row_count, .. } => *row_count,
            SchemaSnapshot::Image { item_count, .. } => *item_count,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        match self {
            SchemaSnapshot::Tabular { columns, .. } => {
                columns.iter().map(|c| c.name.clone()).collect()
            }
            SchemaSnapshot::Image { .. } => {
                vec!["class".into(), "width".into(), "height".into()]
            }
        }
    }

    /// Structural equality ignoring counts; used by refresh to decide whether
    /// anything changed besides the data volume.
    pub fn same_structure(&self, other: &SchemaSnapshot) -> bool {
        match (self, other) {
            (
                SchemaSnapshot::Tabular { columns: a, .. },
                SchemaSnapshot::Tabular { columns: b, .. },
            ) => a == b,
            (SchemaSnapshot::Image { image: a, .. }, SchemaSnapshot::Image { image: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}

/// Knobs for the inference pass, passed in explicitly; there is no global
/// configuration state.
#[derive(Debug, Clone, Copy)]
pub struct InferenceOptions {
    /// Rows sampled for type classification; 0 scans everything.
    pub sample_rows: usize,
    /// Delimiter override; resolved from the extension when `None`.
    pub delimiter: Option<u8>,
    /// Input text encoding for delimited sources.
    pub encoding: &'static Encoding,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        InferenceOptions {
            sample_rows: DEFAULT_SAMPLE_ROWS,
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

/// Derives a [`SchemaSnapshot`] from a raw source. Every failure mode —
/// missing path, unparsable content, empty source — surfaces as
/// [`DatasetError::UnreadableDataset`].
pub fn infer_schema(
    path: &Path,
    format: SourceFormat,
    options: &InferenceOptions,
) -> Result<SchemaSnapshot> {
    if !path.exists() {
        return Err(DatasetError::unreadable(path, "path not found"));
    }
    match format {
        SourceFormat::Csv => infer_delimited(path, options),
        SourceFormat::Json => infer_json(path, options),
        SourceFormat::Images => infer_images(path),
    }
}

#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    non_null: usize,
    numeric_matches: usize,
    distinct: HashSet<String>,
    distinct_overflow: bool,
}

impl TypeCandidate {
    fn update(&mut self, value: &str) {
        let Some(token) = data::normalize_cell(value) else {
            return;
        };
        self.non_null += 1;
        if data::parse_numeric(token).is_some() {
            self.numeric_matches += 1;
        }
        if !self.distinct_overflow && !self.distinct.contains(token) {
            if self.distinct.len() >= DISTINCT_SAMPLE_CAP {
                self.distinct_overflow = true;
            } else {
                self.distinct.insert(token.to_string());
            }
        }
    }

    /// Decided once per column. Mixed numeric/text samples fall back to
    /// `Categorical` rather than guessing a stricter rule.
    fn decide(&self) -> ColumnType {
        if self.non_null == 0 {
            return ColumnType::Text;
        }
        if self.numeric_matches == self.non_null {
            return ColumnType::Numeric;
        }
        if self.numeric_matches > 0 {
            return ColumnType::Categorical;
        }
        if self.distinct_overflow {
            return ColumnType::Text;
        }
        let distinct = self.distinct.len();
        if distinct <= CATEGORICAL_MAX_CLASSES || distinct * 2 <= self.non_null {
            ColumnType::Categorical
        } else {
            ColumnType::Text
        }
    }
}

fn infer_delimited(path: &Path, options: &InferenceOptions) -> Result<SchemaSnapshot> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)
        .map_err(|err| DatasetError::unreadable(path, err))?;

    let headers = reader
        .byte_headers()
        .map_err(|err| DatasetError::unreadable(path, err))
        .and_then(|record| {
            io_utils::decode_record(record, options.encoding)
                .map_err(|err| DatasetError::unreadable(path, err))
        })?;
    if headers.is_empty() {
        return Err(DatasetError::unreadable(path, "file is empty"));
    }
    let names = assign_column_names(&headers);

    let mut candidates = vec![TypeCandidate::default(); names.len()];
    let mut row_count = 0u64;
    let mut record = csv::ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => return Err(DatasetError::unreadable(path, err)),
        }
        let sampled = options.sample_rows == 0 || (row_count as usize) < options.sample_rows;
        if sampled {
            for (idx, candidate) in candidates.iter_mut().enumerate() {
                let field = record.get(idx).unwrap_or_default();
                let text = io_utils::decode_bytes(field, options.encoding)
                    .map_err(|err| DatasetError::unreadable(path, err))?;
                candidate.update(&text);
            }
        }
        row_count += 1;
    }

    let columns = names
        .into_iter()
        .zip(candidates.iter())
        .map(|(name, candidate)| ColumnDef {
            name,
            datatype: candidate.decide(),
        })
        .collect();
    Ok(SchemaSnapshot::Tabular { columns, row_count })
}

fn assign_column_names(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let trimmed = header.trim();
            if trimmed.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                trimmed.to_string()
            }
        })
        .collect()
}

/// Parses a JSON source into row objects. Accepts a top-level array of
/// objects or JSON lines; anything else is unreadable.
pub(crate) fn read_json_rows(path: &Path) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    let text = std::fs::read_to_string(path).map_err(|err| DatasetError::unreadable(path, err))?;
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Err(DatasetError::unreadable(path, "file is empty"));
    }

    let values: Vec<serde_json::Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|err| DatasetError::unreadable(path, err))?
    } else {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|err| DatasetError::unreadable(path, err))
            })
            .collect::<Result<Vec<_>>>()?
    };
    if values.is_empty() {
        return Err(DatasetError::unreadable(path, "no records in JSON source"));
    }

    values
        .into_iter()
        .map(|value| match value {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(DatasetError::unreadable(
                path,
                format!("expected a JSON object per record, found {other}"),
            )),
        })
        .collect()
}

/// Renders a JSON scalar the way it would appear in a delimited cell. Nested
/// structures collapse to their compact JSON text and read as free-form text.
pub(crate) fn json_cell(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn infer_json(path: &Path, options: &InferenceOptions) -> Result<SchemaSnapshot> {
    let rows = read_json_rows(path)?;
    let row_count = rows.len() as u64;

    // Column order is the first-seen key order across all rows, mirroring how
    // the records themselves introduce fields.
    let mut names: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for row in &rows {
        for key in row.keys() {
            if seen.insert(key.clone()) {
                names.push(key.clone());
            }
        }
    }

    let mut candidates = vec![TypeCandidate::default(); names.len()];
    let sample = if options.sample_rows == 0 {
        rows.len()
    } else {
        rows.len().min(options.sample_rows)
    };
    for row in rows.iter().take(sample) {
        for (idx, name) in names.iter().enumerate() {
            if let Some(cell) = row.get(name).and_then(json_cell) {
                candidates[idx].update(&cell);
            }
        }
    }

    let columns = names
        .into_iter()
        .zip(candidates.iter())
        .map(|(name, candidate)| ColumnDef {
            name,
            datatype: candidate.decide(),
        })
        .collect();
    Ok(SchemaSnapshot::Tabular { columns, row_count })
}

fn infer_images(path: &Path) -> Result<SchemaSnapshot> {
    let files =
        io_utils::collect_image_files(path).map_err(|err| DatasetError::unreadable(path, err))?;
    if files.is_empty() {
        return Err(DatasetError::unreadable(path, "no image files found"));
    }

    // Mode over a sample of probed headers; ties resolve to the first probe.
    let mut probes: Vec<(image::ImageProbe, usize)> = Vec::new();
    for (file, _) in files.iter().take(IMAGE_PROBE_SAMPLE) {
        let prefix = io_utils::read_prefix(file, 512)
            .map_err(|err| DatasetError::unreadable(path, err))?;
        if let Some(probe) = image::probe(&prefix) {
            match probes.iter_mut().find(|(seen, _)| *seen == probe) {
                Some((_, count)) => *count += 1,
                None => probes.push((probe, 1)),
            }
        }
    }
    let Some((common, _)) = probes.iter().rev().max_by_key(|(_, count)| *count) else {
        return Err(DatasetError::unreadable(
            path,
            "no readable image headers in sample",
        ));
    };

    let mut classes: Vec<String> = Vec::new();
    for (_, class) in &files {
        if !classes.contains(class) {
            classes.push(class.clone());
        }
    }
    classes.sort();

    Ok(SchemaSnapshot::Image {
        image: ImageSchema {
            width: common.width,
            height: common.height,
            channels: common.channels,
            format: common.format,
            classes,
        },
        item_count: files.len() as u64,
    })
}
