//! Per-column statistics computation.
//!
//! Consumes a [`SchemaSnapshot`] plus the raw source and produces a
//! [`StatisticsSnapshot`]. Numeric columns stream through a running
//! accumulator (no per-value storage); categorical and text columns build a
//! frequency table ranked by count with ties broken by first-seen order, so
//! identical input always yields bit-identical snapshots.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::{
    data,
    dataset::SourceFormat,
    error::{DatasetError, Result},
    image, io_utils,
    schema::{self, ColumnDef, ColumnType, SchemaSnapshot},
};

/// Default cap on stored frequency-table entries per column.
pub const DEFAULT_TOP_VALUES: usize = 10;

/// Knobs for the statistics pass.
#[derive(Debug, Clone, Copy)]
pub struct StatsOptions {
    /// Frequency-table entries retained per categorical column; 0 keeps all.
    pub top_values: usize,
    /// Delimiter override for delimited sources.
    pub delimiter: Option<u8>,
    /// Input text encoding for delimited sources.
    pub encoding: &'static Encoding,
}

impl Default for StatsOptions {
    fn default() -> Self {
        StatsOptions {
            top_values: DEFAULT_TOP_VALUES,
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub null_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalStats {
    pub distinct: u64,
    pub null_count: u64,
    /// Highest-frequency values, count descending, ties in first-seen order.
    pub top: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnStatistics {
    Numeric(NumericStats),
    Categorical(CategoricalStats),
}

/// Mapping from column (or image attribute) name to its statistics record.
/// A `BTreeMap` keeps serialization order independent of insertion order.
pub type StatisticsSnapshot = BTreeMap<String, ColumnStatistics>;

#[derive(Debug, Default)]
struct NumericAccumulator {
    count: u64,
    sum: f64,
    sum_squares: f64,
    min: Option<f64>,
    max: Option<f64>,
    nulls: u64,
}

impl NumericAccumulator {
    fn record(&mut self, cell: Option<&str>) {
        // Values the sampler never saw can still fail to parse; they count
        // as nulls rather than poisoning the column.
        let Some(value) = cell.and_then(data::parse_numeric) else {
            self.nulls += 1;
            return;
        };
        self.record_value(value);
    }

    fn record_value(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_squares += value * value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    fn finalize(self) -> NumericStats {
        let mean = (self.count > 0).then(|| self.sum / self.count as f64);
        let std_dev = (self.count > 1).then(|| {
            let count = self.count as f64;
            let mean = self.sum / count;
            let variance = (self.sum_squares - count * mean * mean) / (count - 1.0);
            variance.max(0.0).sqrt()
        });
        NumericStats {
            min: self.min,
            max: self.max,
            mean,
            std_dev,
            null_count: self.nulls,
        }
    }
}

#[derive(Debug, Default)]
struct CategoryAccumulator {
    nulls: u64,
    /// value -> (count, first-seen rank)
    counts: HashMap<String, (u64, u64)>,
    next_rank: u64,
}

impl CategoryAccumulator {
    fn record(&mut self, cell: Option<&str>) {
        let Some(value) = cell else {
            self.nulls += 1;
            return;
        };
        match self.counts.get_mut(value) {
            Some((count, _)) => *count += 1,
            None => {
                self.counts.insert(value.to_string(), (1, self.next_rank));
                self.next_rank += 1;
            }
        }
    }

    fn finalize(self, top: usize) -> CategoricalStats {
        let distinct = self.counts.len() as u64;
        let mut ranked: Vec<ValueCount> = self
            .counts
            .into_iter()
            .sorted_by(|(_, (count_a, rank_a)), (_, (count_b, rank_b))| {
                count_b.cmp(count_a).then_with(|| rank_a.cmp(rank_b))
            })
            .map(|(value, (count, _))| ValueCount { value, count })
            .collect();
        if top > 0 && ranked.len() > top {
            ranked.truncate(top);
        }
        CategoricalStats {
            distinct,
            null_count: self.nulls,
            top: ranked,
        }
    }
}

enum ColumnAccumulator {
    Numeric(NumericAccumulator),
    Categorical(CategoryAccumulator),
}

impl ColumnAccumulator {
    fn for_column(datatype: ColumnType) -> Self {
        match datatype {
            ColumnType::Numeric => ColumnAccumulator::Numeric(NumericAccumulator::default()),
            ColumnType::Categorical | ColumnType::Text => {
                ColumnAccumulator::Categorical(CategoryAccumulator::default())
            }
        }
    }

    fn record(&mut self, raw: &str) {
        let cell = data::normalize_cell(raw);
        match self {
            ColumnAccumulator::Numeric(acc) => acc.record(cell),
            ColumnAccumulator::Categorical(acc) => acc.record(cell),
        }
    }

    fn finalize(self, top: usize) -> ColumnStatistics {
        match self {
            ColumnAccumulator::Numeric(acc) => ColumnStatistics::Numeric(acc.finalize()),
            ColumnAccumulator::Categorical(acc) => {
                ColumnStatistics::Categorical(acc.finalize(top))
            }
        }
    }
}

/// Computes the statistics snapshot for one source against its inferred
/// schema. Deterministic for identical input bytes.
pub fn compute_statistics(
    path: &Path,
    format: SourceFormat,
    schema: &SchemaSnapshot,
    options: &StatsOptions,
) -> Result<StatisticsSnapshot> {
    match (format, schema) {
        (SourceFormat::Csv, SchemaSnapshot::Tabular { columns, .. }) => {
            compute_delimited(path, columns, options)
        }
        (SourceFormat::Json, SchemaSnapshot::Tabular { columns, .. }) => {
            compute_json(path, columns, options)
        }
        (SourceFormat::Images, SchemaSnapshot::Image { .. }) => compute_images(path, options),
        _ => Err(DatasetError::unreadable(
            path,
            "schema snapshot does not match source format",
        )),
    }
}

fn compute_delimited(
    path: &Path,
    columns: &[ColumnDef],
    options: &StatsOptions,
) -> Result<StatisticsSnapshot> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)
        .map_err(|err| DatasetError::unreadable(path, err))?;

    let mut accumulators: Vec<ColumnAccumulator> = columns
        .iter()
        .map(|column| ColumnAccumulator::for_column(column.datatype))
        .collect();

    let mut record = csv::ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => return Err(DatasetError::unreadable(path, err)),
        }
        for (idx, accumulator) in accumulators.iter_mut().enumerate() {
            let field = record.get(idx).unwrap_or_default();
            let text = io_utils::decode_bytes(field, options.encoding)
                .map_err(|err| DatasetError::unreadable(path, err))?;
            accumulator.record(&text);
        }
    }

    Ok(finalize_columns(columns, accumulators, options.top_values))
}

fn compute_json(
    path: &Path,
    columns: &[ColumnDef],
    options: &StatsOptions,
) -> Result<StatisticsSnapshot> {
    let rows = schema::read_json_rows(path)?;
    let mut accumulators: Vec<ColumnAccumulator> = columns
        .iter()
        .map(|column| ColumnAccumulator::for_column(column.datatype))
        .collect();

    for row in &rows {
        for (column, accumulator) in columns.iter().zip(accumulators.iter_mut()) {
            match row.get(&column.name).and_then(schema::json_cell) {
                Some(cell) => accumulator.record(&cell),
                None => accumulator.record(""),
            }
        }
    }

    Ok(finalize_columns(columns, accumulators, options.top_values))
}

fn finalize_columns(
    columns: &[ColumnDef],
    accumulators: Vec<ColumnAccumulator>,
    top: usize,
) -> StatisticsSnapshot {
    columns
        .iter()
        .zip(accumulators)
        .map(|(column, accumulator)| (column.name.clone(), accumulator.finalize(top)))
        .collect()
}

/// Image statistics: a categorical class distribution plus numeric width and
/// height summaries over every probeable file.
fn compute_images(path: &Path, options: &StatsOptions) -> Result<StatisticsSnapshot> {
    let files =
        io_utils::collect_image_files(path).map_err(|err| DatasetError::unreadable(path, err))?;
    if files.is_empty() {
        return Err(DatasetError::unreadable(path, "no image files found"));
    }

    let mut classes = CategoryAccumulator::default();
    let mut widths = NumericAccumulator::default();
    let mut heights = NumericAccumulator::default();
    for (file, class) in &files {
        classes.record(Some(class));
        let prefix = io_utils::read_prefix(file, 512)
            .map_err(|err| DatasetError::unreadable(path, err))?;
        match image::probe(&prefix) {
            Some(probe) => {
                widths.record_value(f64::from(probe.width));
                heights.record_value(f64::from(probe.height));
            }
            None => {
                widths.record(None);
                heights.record(None);
            }
        }
    }

    let mut snapshot = StatisticsSnapshot::new();
    snapshot.insert(
        "class".into(),
        ColumnStatistics::Categorical(classes.finalize(options.top_values)),
    );
    snapshot.insert(
        "width".into(),
        ColumnStatistics::Numeric(widths.finalize()),
    );
    snapshot.insert(
        "height".into(),
        ColumnStatistics::Numeric(heights.finalize()),
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_accumulator_tracks_summary() {
        let mut acc = NumericAccumulator::default();
        for value in ["18", "65", "40", "", "n/a"] {
            acc.record(data::normalize_cell(value));
        }
        let stats = acc.finalize();
        assert_eq!(stats.min, Some(18.0));
        assert_eq!(stats.max, Some(65.0));
        assert_eq!(stats.null_count, 2);
        let mean = stats.mean.expect("mean");
        assert!((mean - 41.0).abs() < 1e-9);
    }

    #[test]
    fn frequency_ties_break_by_first_seen() {
        let mut acc = CategoryAccumulator::default();
        for value in ["zebra", "apple", "zebra", "apple", "mango"] {
            acc.record(Some(value));
        }
        let stats = acc.finalize(2);
        assert_eq!(stats.distinct, 3);
        let values: Vec<&str> = stats.top.iter().map(|v| v.value.as_str()).collect();
        // zebra and apple tie on count; zebra appeared first.
        assert_eq!(values, ["zebra", "apple"]);
    }

    #[test]
    fn top_cap_zero_keeps_everything() {
        let mut acc = CategoryAccumulator::default();
        for value in ["a", "b", "c"] {
            acc.record(Some(value));
        }
        let stats = acc.finalize(0);
        assert_eq!(stats.top.len(), 3);
    }
}
