mod common;

use common::{TestWorkspace, ages_csv};

use datasmith::dataset::{Dataset, SourceFormat};
use datasmith::error::DatasetError;
use datasmith::registry::{FileRegistry, MemoryRegistry, Registry};
use datasmith::schema::{InferenceOptions, infer_schema};
use datasmith::service::DatasetService;
use datasmith::stats::{StatsOptions, compute_statistics};
use datasmith::version::VersionTracker;

fn sample_dataset(workspace: &TestWorkspace) -> (Dataset, std::path::PathBuf) {
    let path = workspace.write("data.csv", &ages_csv());
    let mut dataset = Dataset::new("ages", &path, SourceFormat::Csv);
    dataset.source_bytes = std::fs::metadata(&path).expect("metadata").len();
    (dataset, path)
}

#[test]
fn file_registry_round_trips_datasets_and_versions() {
    let workspace = TestWorkspace::new();
    let (dataset, path) = sample_dataset(&workspace);

    let schema =
        infer_schema(&path, SourceFormat::Csv, &InferenceOptions::default()).expect("infer");
    let statistics = compute_statistics(&path, SourceFormat::Csv, &schema, &StatsOptions::default())
        .expect("stats");

    let root = workspace.path().join("registry");
    let mut registry = FileRegistry::open(&root).expect("open registry");
    registry.save_dataset(&dataset).expect("save dataset");
    let mut tracker = VersionTracker::new(&mut registry);
    let version = tracker
        .create_initial_version(
            &dataset,
            schema,
            statistics,
            100,
            "digest".to_string(),
        )
        .expect("initial version");

    // A fresh handle over the same root sees identical records.
    let reopened = FileRegistry::open(&root).expect("reopen registry");
    let loaded = reopened.load_dataset(dataset.id).expect("load dataset");
    assert_eq!(
        serde_json::to_string(&loaded).expect("serialize"),
        serde_json::to_string(&dataset).expect("serialize")
    );
    let versions = reopened.list_versions(dataset.id).expect("versions");
    assert_eq!(versions.len(), 1);
    assert_eq!(
        serde_json::to_string(&versions[0]).expect("serialize"),
        serde_json::to_string(&version).expect("serialize")
    );
}

#[test]
fn file_registry_deletes_dataset_and_history_together() {
    let workspace = TestWorkspace::new();
    let (dataset, _path) = sample_dataset(&workspace);

    let root = workspace.path().join("registry");
    let mut registry = FileRegistry::open(&root).expect("open registry");
    registry.save_dataset(&dataset).expect("save dataset");

    registry.delete_dataset(dataset.id).expect("delete");
    assert!(matches!(
        registry.load_dataset(dataset.id),
        Err(DatasetError::UnknownDataset { .. })
    ));
    assert!(matches!(
        registry.list_versions(dataset.id),
        Err(DatasetError::UnknownDataset { .. })
    ));
}

#[test]
fn registries_list_datasets_in_name_order() {
    let workspace = TestWorkspace::new();
    let (_, path) = sample_dataset(&workspace);

    let mut memory = MemoryRegistry::new();
    let root = workspace.path().join("registry");
    let mut file = FileRegistry::open(&root).expect("open registry");
    for name in ["walrus", "aardvark", "mango"] {
        let dataset = Dataset::new(name, &path, SourceFormat::Csv);
        memory.save_dataset(&dataset).expect("save");
        file.save_dataset(&dataset).expect("save");
    }

    let memory_names: Vec<String> = memory
        .list_datasets()
        .expect("list")
        .into_iter()
        .map(|d| d.name)
        .collect();
    let file_names: Vec<String> = file
        .list_datasets()
        .expect("list")
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(memory_names, ["aardvark", "mango", "walrus"]);
    assert_eq!(file_names, memory_names);
}

#[test]
fn unknown_ids_surface_as_named_errors() {
    let registry = MemoryRegistry::new();
    let id = datasmith::dataset::DatasetId::generate();
    assert!(matches!(
        registry.load_dataset(id),
        Err(DatasetError::UnknownDataset { .. })
    ));
}

#[test]
fn service_works_identically_over_the_file_registry() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("data.csv", &ages_csv());
    let root = workspace.path().join("registry");

    let registry = FileRegistry::open(&root).expect("open registry");
    let mut service = DatasetService::new(registry);
    let (dataset, version) = service.import(&path, Some("ages".into())).expect("import");
    assert_eq!(version.sequence, 1);

    // Reopen from disk and continue the history.
    let registry = FileRegistry::open(&root).expect("reopen registry");
    let mut service = DatasetService::new(registry);
    let mut contents = ages_csv();
    contents.push_str("70,lizard\n");
    std::fs::write(&path, contents).expect("rewrite");
    let (_, outcome) = service.refresh(dataset.id, false).expect("refresh");
    assert_eq!(outcome.recorded().expect("recorded").sequence, 2);
}
