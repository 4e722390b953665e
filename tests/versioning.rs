mod common;

use common::{TestWorkspace, ages_csv};

use datasmith::error::DatasetError;
use datasmith::registry::{MemoryRegistry, Registry};
use datasmith::service::DatasetService;
use datasmith::version::RefreshOutcome;

fn import_ages(
    workspace: &TestWorkspace,
) -> (
    DatasetService<MemoryRegistry>,
    datasmith::dataset::Dataset,
    std::path::PathBuf,
) {
    let path = workspace.write("data.csv", &ages_csv());
    let mut service = DatasetService::new(MemoryRegistry::new());
    let (dataset, version) = service.import(&path, None).expect("import");
    assert_eq!(version.sequence, 1);
    (service, dataset, path)
}

#[test]
fn import_records_exactly_one_initial_version() {
    let workspace = TestWorkspace::new();
    let (service, dataset, _) = import_ages(&workspace);

    let versions = service.versions(dataset.id).expect("versions");
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].sequence, 1);
    assert_eq!(versions[0].item_count, 100);
    assert!(!versions[0].source_digest.is_empty());
}

#[test]
fn duplicate_initial_version_is_rejected_and_history_kept() {
    let workspace = TestWorkspace::new();
    let (service, dataset, _path) = import_ages(&workspace);

    let version = service.latest_version(dataset.id).expect("latest");
    let mut registry = MemoryRegistry::new();
    registry.save_dataset(&dataset).expect("save dataset");
    registry
        .save_version(dataset.id, &version)
        .expect("save version");

    let mut tracker = datasmith::version::VersionTracker::new(&mut registry);
    let err = tracker
        .create_initial_version(
            &dataset,
            version.schema.clone(),
            version.statistics.clone(),
            version.item_count,
            version.source_digest.clone(),
        )
        .expect_err("second initial version must fail");
    assert!(matches!(err, DatasetError::DuplicateDataset { .. }));
    assert_eq!(registry.list_versions(dataset.id).expect("versions").len(), 1);

    // The service-level path reports the same on a re-imported existing file.
    let versions = service.versions(dataset.id).expect("versions");
    assert_eq!(versions.len(), 1);
}

#[test]
fn refresh_appends_one_version_and_leaves_history_untouched() {
    let workspace = TestWorkspace::new();
    let (mut service, dataset, path) = import_ages(&workspace);

    let before = service.versions(dataset.id).expect("versions");
    let prior_snapshot = serde_json::to_string(&before[0]).expect("serialize");

    // Change the data so the refresh records a new version.
    let mut contents = ages_csv();
    contents.push_str("99,lizard\n");
    std::fs::write(&path, contents).expect("rewrite source");

    let (_, outcome) = service.refresh(dataset.id, false).expect("refresh");
    let version = outcome.recorded().expect("version recorded").clone();
    assert_eq!(version.sequence, 2);
    assert_eq!(version.item_count, 101);

    let after = service.versions(dataset.id).expect("versions");
    assert_eq!(after.len(), 2);
    let prior_after = serde_json::to_string(&after[0]).expect("serialize");
    assert_eq!(prior_snapshot, prior_after, "prior version must not mutate");
}

#[test]
fn refresh_of_unchanged_source_is_an_advisory_not_a_version() {
    let workspace = TestWorkspace::new();
    let (mut service, dataset, _path) = import_ages(&workspace);

    let (_, outcome) = service.refresh(dataset.id, false).expect("refresh");
    match outcome {
        RefreshOutcome::Unchanged { sequence } => assert_eq!(sequence, 1),
        RefreshOutcome::Recorded(_) => panic!("unchanged source must not record"),
    }
    assert_eq!(service.versions(dataset.id).expect("versions").len(), 1);
}

#[test]
fn forced_refresh_records_even_without_changes() {
    let workspace = TestWorkspace::new();
    let (mut service, dataset, _path) = import_ages(&workspace);

    let (_, outcome) = service.refresh(dataset.id, true).expect("refresh");
    let version = outcome.recorded().expect("version recorded");
    assert_eq!(version.sequence, 2);
    assert_eq!(service.versions(dataset.id).expect("versions").len(), 2);
}

#[test]
fn refresh_after_source_deletion_fails_and_history_is_unchanged() {
    let workspace = TestWorkspace::new();
    let (mut service, dataset, path) = import_ages(&workspace);

    std::fs::remove_file(&path).expect("delete source");
    let err = service
        .refresh(dataset.id, false)
        .expect_err("missing source must fail");
    assert!(matches!(err, DatasetError::SourceMissing { .. }));
    assert_eq!(service.versions(dataset.id).expect("versions").len(), 1);
}

#[test]
fn sequences_stay_contiguous_across_many_refreshes() {
    let workspace = TestWorkspace::new();
    let (mut service, dataset, path) = import_ages(&workspace);

    for round in 0..4 {
        let mut contents = ages_csv();
        for extra in 0..=round {
            contents.push_str(&format!("{},snake\n", 70 + extra));
        }
        std::fs::write(&path, contents).expect("rewrite source");
        service.refresh(dataset.id, false).expect("refresh");
    }

    let versions = service.versions(dataset.id).expect("versions");
    let sequences: Vec<u32> = versions.iter().map(|v| v.sequence).collect();
    assert_eq!(sequences, [1, 2, 3, 4, 5]);
}

#[test]
fn delete_removes_dataset_and_versions_together() {
    let workspace = TestWorkspace::new();
    let (mut service, dataset, _path) = import_ages(&workspace);

    service.delete(dataset.id).expect("delete");
    assert!(matches!(
        service.dataset(dataset.id),
        Err(DatasetError::UnknownDataset { .. })
    ));
    assert!(matches!(
        service.versions(dataset.id),
        Err(DatasetError::UnknownDataset { .. })
    ));
}

#[test]
fn import_of_unreadable_source_fails_with_named_error() {
    let workspace = TestWorkspace::new();
    let path = workspace.path().join("missing.csv");
    let mut service = DatasetService::new(MemoryRegistry::new());

    let err = service.import(&path, None).expect_err("import must fail");
    assert!(matches!(err, DatasetError::UnreadableDataset { .. }));
}

#[test]
fn detected_target_column_prefers_label_names() {
    let workspace = TestWorkspace::new();
    let (service, dataset, _path) = import_ages(&workspace);

    let version = service.latest_version(dataset.id).expect("latest");
    assert_eq!(
        service.detect_target_column(&version).as_deref(),
        Some("label")
    );
    let distribution = service
        .class_distribution(&version, None)
        .expect("distribution");
    assert_eq!(distribution.len(), 3);
}
