//! The persistence boundary.
//!
//! The versioning core talks to storage exclusively through the [`Registry`]
//! trait; it never sees a concrete engine. Two collaborators ship with the
//! crate: [`MemoryRegistry`] for tests and [`FileRegistry`], which keeps one
//! JSON document per dataset under a root directory.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    dataset::{Dataset, DatasetId},
    error::{DatasetError, Result},
    version::Version,
};

/// Storage interface for dataset and version records.
///
/// Implementations must return datasets in (name, id) order and versions in
/// sequence order, so callers see a deterministic view regardless of engine.
pub trait Registry {
    fn save_dataset(&mut self, dataset: &Dataset) -> Result<()>;
    fn load_dataset(&self, id: DatasetId) -> Result<Dataset>;
    fn list_datasets(&self) -> Result<Vec<Dataset>>;
    fn save_version(&mut self, id: DatasetId, version: &Version) -> Result<()>;
    fn list_versions(&self, id: DatasetId) -> Result<Vec<Version>>;
    /// Removes the dataset and every one of its versions together.
    fn delete_dataset(&mut self, id: DatasetId) -> Result<()>;
}

fn sort_datasets(mut datasets: Vec<Dataset>) -> Vec<Dataset> {
    datasets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    datasets
}

/// In-memory registry. Single-threaded by design, like the rest of the core.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: BTreeMap<DatasetId, (Dataset, Vec<Version>)>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for MemoryRegistry {
    fn save_dataset(&mut self, dataset: &Dataset) -> Result<()> {
        self.records
            .entry(dataset.id)
            .and_modify(|(existing, _)| *existing = dataset.clone())
            .or_insert_with(|| (dataset.clone(), Vec::new()));
        Ok(())
    }

    fn load_dataset(&self, id: DatasetId) -> Result<Dataset> {
        self.records
            .get(&id)
            .map(|(dataset, _)| dataset.clone())
            .ok_or(DatasetError::UnknownDataset { id })
    }

    fn list_datasets(&self) -> Result<Vec<Dataset>> {
        Ok(sort_datasets(
            self.records
                .values()
                .map(|(dataset, _)| dataset.clone())
                .collect(),
        ))
    }

    fn save_version(&mut self, id: DatasetId, version: &Version) -> Result<()> {
        let (_, versions) = self
            .records
            .get_mut(&id)
            .ok_or(DatasetError::UnknownDataset { id })?;
        versions.push(version.clone());
        versions.sort_by_key(|v| v.sequence);
        Ok(())
    }

    fn list_versions(&self, id: DatasetId) -> Result<Vec<Version>> {
        self.records
            .get(&id)
            .map(|(_, versions)| versions.clone())
            .ok_or(DatasetError::UnknownDataset { id })
    }

    fn delete_dataset(&mut self, id: DatasetId) -> Result<()> {
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or(DatasetError::UnknownDataset { id })
    }
}

/// On-disk document for one dataset: the record plus its full history.
#[derive(Debug, Serialize, Deserialize)]
struct DatasetDocument {
    dataset: Dataset,
    versions: Vec<Version>,
}

/// JSON-file registry: `<root>/<dataset-id>.json` per dataset.
#[derive(Debug)]
pub struct FileRegistry {
    root: PathBuf,
}

impl FileRegistry {
    /// Opens (and creates if needed) a registry rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(DatasetError::registry)?;
        Ok(FileRegistry { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: DatasetId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn read_document(&self, id: DatasetId) -> Result<DatasetDocument> {
        let path = self.document_path(id);
        if !path.exists() {
            return Err(DatasetError::UnknownDataset { id });
        }
        let file = File::open(&path).map_err(DatasetError::registry)?;
        serde_json::from_reader(BufReader::new(file)).map_err(DatasetError::registry)
    }

    fn write_document(&self, document: &DatasetDocument) -> Result<()> {
        let path = self.document_path(document.dataset.id);
        let file = File::create(&path).map_err(DatasetError::registry)?;
        serde_json::to_writer_pretty(file, document).map_err(DatasetError::registry)
    }
}

impl Registry for FileRegistry {
    fn save_dataset(&mut self, dataset: &Dataset) -> Result<()> {
        let document = match self.read_document(dataset.id) {
            Ok(mut existing) => {
                existing.dataset = dataset.clone();
                existing
            }
            Err(DatasetError::UnknownDataset { .. }) => DatasetDocument {
                dataset: dataset.clone(),
                versions: Vec::new(),
            },
            Err(err) => return Err(err),
        };
        self.write_document(&document)
    }

    fn load_dataset(&self, id: DatasetId) -> Result<Dataset> {
        Ok(self.read_document(id)?.dataset)
    }

    fn list_datasets(&self) -> Result<Vec<Dataset>> {
        let mut datasets = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(DatasetError::registry)?;
        for entry in entries {
            let entry = entry.map_err(DatasetError::registry)?;
            let name = entry.file_name();
            let Some(stem) = Path::new(&name)
                .file_stem()
                .and_then(|stem| stem.to_str())
            else {
                continue;
            };
            if !name.to_string_lossy().ends_with(".json") {
                continue;
            }
            let Some(id) = DatasetId::parse(stem) else {
                continue;
            };
            datasets.push(self.read_document(id)?.dataset);
        }
        Ok(sort_datasets(datasets))
    }

    fn save_version(&mut self, id: DatasetId, version: &Version) -> Result<()> {
        let mut document = self.read_document(id)?;
        document.versions.push(version.clone());
        document.versions.sort_by_key(|v| v.sequence);
        self.write_document(&document)
    }

    fn list_versions(&self, id: DatasetId) -> Result<Vec<Version>> {
        Ok(self.read_document(id)?.versions)
    }

    fn delete_dataset(&mut self, id: DatasetId) -> Result<()> {
        let path = self.document_path(id);
        if !path.exists() {
            return Err(DatasetError::UnknownDataset { id });
        }
        fs::remove_file(&path).map_err(DatasetError::registry)
    }
}
