mod common;

use assert_cmd::Command;
use common::{TestWorkspace, ages_csv};
use predicates::str::contains;

fn datasmith(workspace: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("datasmith").expect("binary");
    cmd.current_dir(workspace.path());
    cmd.args([
        "--registry",
        workspace.path().join("registry").to_str().expect("utf-8"),
    ]);
    cmd
}

#[test]
fn import_list_show_history_round_trip() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", &ages_csv());

    datasmith(&workspace)
        .args(["import", "-i", "data.csv", "--name", "ages"])
        .assert()
        .success()
        .stdout(contains("Imported 'ages'"))
        .stdout(contains("age"))
        .stdout(contains("numeric"))
        .stdout(contains("100 row(s)"));

    datasmith(&workspace)
        .args(["list"])
        .assert()
        .success()
        .stdout(contains("ages"))
        .stdout(contains("csv"));

    datasmith(&workspace)
        .args(["show", "ages"])
        .assert()
        .success()
        .stdout(contains("version 1 with 100 item(s)"))
        .stdout(contains("detected target column: label"));

    datasmith(&workspace)
        .args(["history", "ages"])
        .assert()
        .success()
        .stdout(contains("version"));

    datasmith(&workspace)
        .args(["stats", "ages"])
        .assert()
        .success()
        .stdout(contains("age"))
        .stdout(contains("18"))
        .stdout(contains("65"));
}

#[test]
fn refresh_without_changes_reports_advisory() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", &ages_csv());

    datasmith(&workspace)
        .args(["import", "-i", "data.csv", "--name", "ages"])
        .assert()
        .success();

    datasmith(&workspace)
        .args(["refresh", "ages"])
        .assert()
        .success()
        .stdout(contains("No change since version 1"));

    datasmith(&workspace)
        .args(["refresh", "ages", "--force"])
        .assert()
        .success()
        .stdout(contains("Recorded version 2"));
}

#[test]
fn delete_removes_the_dataset() {
    let workspace = TestWorkspace::new();
    workspace.write("data.csv", &ages_csv());

    datasmith(&workspace)
        .args(["import", "-i", "data.csv", "--name", "ages"])
        .assert()
        .success();
    datasmith(&workspace)
        .args(["delete", "ages"])
        .assert()
        .success()
        .stdout(contains("Deleted dataset 'ages'"));
    datasmith(&workspace)
        .args(["show", "ages"])
        .assert()
        .failure()
        .stderr(contains("no dataset named 'ages'"));
}

#[test]
fn import_of_unsupported_file_fails() {
    let workspace = TestWorkspace::new();
    workspace.write("blob.bin", "nothing recognizable here");

    datasmith(&workspace)
        .args(["import", "-i", "blob.bin"])
        .assert()
        .failure()
        .stderr(contains("unsupported source format"));
}
