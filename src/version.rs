//! Version records and the append-only version tracker.
//!
//! Version sequence numbers are contiguous per dataset starting at 1, and a
//! version is immutable once appended: a refresh records a new snapshot
//! rather than touching history. The tracker never silently drops a version;
//! every operation either appends or returns a named error.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Dataset,
    error::{DatasetError, Result},
    io_utils,
    registry::Registry,
    schema::{self, InferenceOptions, SchemaSnapshot},
    stats::{self, StatisticsSnapshot, StatsOptions},
};

/// An immutable snapshot of a dataset's schema and statistics at one point
/// in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Monotonically increasing per dataset, starting at 1.
    pub sequence: u32,
    pub created_at: DateTime<Utc>,
    pub schema: SchemaSnapshot,
    pub statistics: StatisticsSnapshot,
    /// Rows for tabular sources, files for image sources.
    pub item_count: u64,
    /// SHA-256 of the source content at snapshot time.
    pub source_digest: String,
}

/// A dataset is `Unversioned` until its first import completes, then
/// `Versioned` permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetState {
    Unversioned,
    Versioned,
}

/// Result of a refresh. `Unchanged` is an advisory, not a failure: schema
/// and item count matched the prior version, so nothing was appended.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Recorded(Version),
    Unchanged { sequence: u32 },
}

impl RefreshOutcome {
    pub fn recorded(&self) -> Option<&Version> {
        match self {
            RefreshOutcome::Recorded(version) => Some(version),
            RefreshOutcome::Unchanged { .. } => None,
        }
    }
}

/// Knobs for a refresh pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshOptions {
    /// Append a version even when schema and item count are unchanged.
    pub record_unchanged: bool,
    pub inference: InferenceOptions,
    pub stats: StatsOptions,
}

/// Append-only history manager. Borrows the registry for the duration of an
/// operation; there is at most one logical writer per dataset.
pub struct VersionTracker<'a, R: Registry + ?Sized> {
    registry: &'a mut R,
}

impl<'a, R: Registry + ?Sized> VersionTracker<'a, R> {
    pub fn new(registry: &'a mut R) -> Self {
        VersionTracker { registry }
    }

    pub fn state(&self, dataset: &Dataset) -> Result<DatasetState> {
        let versions = self.registry.list_versions(dataset.id)?;
        if versions.is_empty() {
            Ok(DatasetState::Unversioned)
        } else {
            Ok(DatasetState::Versioned)
        }
    }

    /// Records version #1 for a freshly imported dataset. Fails with
    /// `DuplicateDataset` when history already exists, leaving it untouched.
    pub fn create_initial_version(
        &mut self,
        dataset: &Dataset,
        schema: SchemaSnapshot,
        statistics: StatisticsSnapshot,
        item_count: u64,
        source_digest: String,
    ) -> Result<Version> {
        if self.state(dataset)? == DatasetState::Versioned {
            return Err(DatasetError::DuplicateDataset {
                name: dataset.name.clone(),
            });
        }
        let version = Version {
            sequence: 1,
            created_at: Utc::now(),
            schema,
            statistics,
            item_count,
            source_digest,
        };
        self.registry.save_version(dataset.id, &version)?;
        info!(
            "Recorded version 1 for dataset '{}' ({} item(s))",
            dataset.name, version.item_count
        );
        Ok(version)
    }

    /// Re-runs inference and statistics against the current source contents
    /// and appends version #(n+1). Fails with `SourceMissing` when the
    /// backing path is gone; reports `Unchanged` when schema and item count
    /// match the prior version and `record_unchanged` is off.
    pub fn refresh(&mut self, dataset: &Dataset, options: &RefreshOptions) -> Result<RefreshOutcome> {
        if !dataset.source.exists() {
            return Err(DatasetError::SourceMissing {
                name: dataset.name.clone(),
                path: dataset.source.clone(),
            });
        }

        let snapshot = schema::infer_schema(&dataset.source, dataset.format, &options.inference)?;
        let statistics =
            stats::compute_statistics(&dataset.source, dataset.format, &snapshot, &options.stats)?;
        let item_count = snapshot.item_count();
        let source_digest = io_utils::source_digest(&dataset.source)
            .map_err(|err| DatasetError::unreadable(&dataset.source, err))?;

        let versions = self.registry.list_versions(dataset.id)?;
        if let Some(prior) = versions.last() {
            let unchanged =
                prior.schema.same_structure(&snapshot) && prior.item_count == item_count;
            if unchanged {
                warn!(
                    "Dataset '{}' is unchanged since version {} (schema and item count identical)",
                    dataset.name, prior.sequence
                );
                if !options.record_unchanged {
                    return Ok(RefreshOutcome::Unchanged {
                        sequence: prior.sequence,
                    });
                }
            }
        }

        let sequence = versions.last().map_or(1, |prior| prior.sequence + 1);
        let version = Version {
            sequence,
            created_at: Utc::now(),
            schema: snapshot,
            statistics,
            item_count,
            source_digest,
        };
        self.registry.save_version(dataset.id, &version)?;
        info!(
            "Recorded version {} for dataset '{}' ({} item(s))",
            version.sequence, dataset.name, version.item_count
        );
        Ok(RefreshOutcome::Recorded(version))
    }
}
