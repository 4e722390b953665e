//! Orchestration facade over the versioning core.
//!
//! The service wires Schema Inferencer → Statistics Computer → Version
//! Tracker → Registry for each user-level operation. It is synchronous and
//! single-threaded; a UI that needs responsiveness offloads these calls to
//! its own worker.

use std::path::Path;

use log::info;

use crate::{
    dataset::{self, Dataset, DatasetId},
    error::{DatasetError, Result},
    io_utils,
    registry::Registry,
    schema::{self, InferenceOptions, SchemaSnapshot},
    stats::{self, ColumnStatistics, StatsOptions, ValueCount},
    version::{RefreshOptions, RefreshOutcome, Version, VersionTracker},
};

/// Column names commonly used for supervised-learning targets, checked in
/// order during target detection.
const TARGET_NAME_HINTS: &[&str] = &["target", "label", "class", "outcome", "result"];

pub struct DatasetService<R: Registry> {
    registry: R,
    inference: InferenceOptions,
    stats: StatsOptions,
}

impl<R: Registry> DatasetService<R> {
    pub fn new(registry: R) -> Self {
        Self::with_options(registry, InferenceOptions::default(), StatsOptions::default())
    }

    pub fn with_options(registry: R, inference: InferenceOptions, stats: StatsOptions) -> Self {
        DatasetService {
            registry,
            inference,
            stats,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Imports a source file or image directory: resolves the format, infers
    /// the schema, computes statistics, and records version #1.
    pub fn import(&mut self, path: &Path, name: Option<String>) -> Result<(Dataset, Version)> {
        if !path.exists() {
            return Err(DatasetError::unreadable(path, "path not found"));
        }
        // Store an absolute source path so refresh is independent of the
        // caller's working directory.
        let path = &path
            .canonicalize()
            .map_err(|err| DatasetError::unreadable(path, err))?;
        let format = io_utils::resolve_format(path)?;
        let name = name.unwrap_or_else(|| dataset::default_name(path));

        let snapshot = schema::infer_schema(path, format, &self.inference)?;
        let statistics = stats::compute_statistics(path, format, &snapshot, &self.stats)?;
        let item_count = snapshot.item_count();
        let digest =
            io_utils::source_digest(path).map_err(|err| DatasetError::unreadable(path, err))?;

        let mut dataset = Dataset::new(name, path, format);
        dataset.source_bytes =
            io_utils::source_size(path).map_err(|err| DatasetError::unreadable(path, err))?;

        self.registry.save_dataset(&dataset)?;
        let recorded = VersionTracker::new(&mut self.registry).create_initial_version(
            &dataset, snapshot, statistics, item_count, digest,
        );
        let version = match recorded {
            Ok(version) => version,
            Err(err) => {
                // Do not leave a dataset behind with no version at all.
                let _ = self.registry.delete_dataset(dataset.id);
                return Err(err);
            }
        };
        info!(
            "Imported '{}' as {} dataset {} ({} item(s))",
            dataset.name, dataset.format, dataset.id, item_count
        );
        Ok((dataset, version))
    }

    /// Re-profiles the source and appends the next version. `force` records
    /// a version even when nothing changed.
    pub fn refresh(&mut self, id: DatasetId, force: bool) -> Result<(Dataset, RefreshOutcome)> {
        let dataset = self.registry.load_dataset(id)?;
        let options = RefreshOptions {
            record_unchanged: force,
            inference: self.inference,
            stats: self.stats,
        };
        let mut tracker = VersionTracker::new(&mut self.registry);
        let outcome = tracker.refresh(&dataset, &options)?;
        Ok((dataset, outcome))
    }

    pub fn dataset(&self, id: DatasetId) -> Result<Dataset> {
        self.registry.load_dataset(id)
    }

    pub fn datasets(&self) -> Result<Vec<Dataset>> {
        self.registry.list_datasets()
    }

    pub fn versions(&self, id: DatasetId) -> Result<Vec<Version>> {
        self.registry.list_versions(id)
    }

    pub fn latest_version(&self, id: DatasetId) -> Result<Version> {
        self.registry
            .list_versions(id)?
            .into_iter()
            .next_back()
            .ok_or(DatasetError::UnknownDataset { id })
    }

    /// Removes the dataset and its whole version history together.
    pub fn delete(&mut self, id: DatasetId) -> Result<()> {
        let dataset = self.registry.load_dataset(id)?;
        self.registry.delete_dataset(id)?;
        info!("Deleted dataset '{}' ({})", dataset.name, dataset.id);
        Ok(())
    }

    /// Resolves a user-supplied reference: a full dataset id, or a unique
    /// dataset name.
    pub fn resolve(&self, reference: &str) -> Result<Dataset> {
        if let Some(id) = DatasetId::parse(reference) {
            return self.registry.load_dataset(id);
        }
        let matches: Vec<Dataset> = self
            .registry
            .list_datasets()?
            .into_iter()
            .filter(|dataset| dataset.name == reference)
            .collect();
        match matches.len() {
            1 => Ok(matches.into_iter().next().expect("single match")),
            0 => Err(DatasetError::registry(format!(
                "no dataset named '{reference}'"
            ))),
            _ => Err(DatasetError::registry(format!(
                "dataset name '{reference}' is ambiguous; use the id"
            ))),
        }
    }

    /// Best-effort guess at the supervised-learning target column: common
    /// target names first, `class` for image datasets, then the last column.
    pub fn detect_target_column(&self, version: &Version) -> Option<String> {
        match &version.schema {
            SchemaSnapshot::Image { .. } => Some("class".into()),
            SchemaSnapshot::Tabular { columns, .. } => {
                for hint in TARGET_NAME_HINTS {
                    if let Some(column) = columns
                        .iter()
                        .find(|column| column.name.to_ascii_lowercase().contains(hint))
                    {
                        return Some(column.name.clone());
                    }
                }
                columns.last().map(|column| column.name.clone())
            }
        }
    }

    /// Class distribution for a target column of a recorded version. Falls
    /// back to the detected target when no column is named.
    pub fn class_distribution(
        &self,
        version: &Version,
        column: Option<&str>,
    ) -> Result<Vec<ValueCount>> {
        let target = match column {
            Some(name) => name.to_string(),
            None => self
                .detect_target_column(version)
                .ok_or_else(|| DatasetError::registry("dataset has no columns"))?,
        };
        match version.statistics.get(&target) {
            Some(ColumnStatistics::Categorical(stats)) => Ok(stats.top.clone()),
            Some(ColumnStatistics::Numeric(_)) => Err(DatasetError::registry(format!(
                "column '{target}' is numeric, not categorical"
            ))),
            None => Err(DatasetError::registry(format!(
                "no statistics recorded for column '{target}'"
            ))),
        }
    }
}
