use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture_manifest() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/jaffle-shop/target/manifest.json")
}

fn dbtgate() -> Command {
    let mut cmd = Command::cargo_bin("dbtgate").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn passing_model_exits_zero() {
    dbtgate()
        .arg("check-model-has-tests-by-name")
        .arg("--manifest")
        .arg(fixture_manifest())
        .args(["--tests", "unique=1", "not_null=1", "--", "models/model_x.sql"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn failing_model_prints_violation() {
    dbtgate()
        .arg("check-model-has-tests-by-name")
        .arg("--manifest")
        .arg(fixture_manifest())
        .args(["--tests", "unique=2", "--", "models/model_x.sql"])
        .assert()
        .code(1)
        .stdout("model_x: has only 1 unique tests, but 2 are required.\n");
}

#[test]
fn model_columns_hook() {
    dbtgate()
        .arg("check-model-has-columns-by-name")
        .arg("--manifest")
        .arg(fixture_manifest())
        .args(["--cols", "first_name=3", "--", "models/staging/stg_customers.sql"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "stg_customers: has only 2 first_name columns, but 3 are required.",
        ));
}

#[test]
fn source_group_hook() {
    let run = |cnt: &str| {
        let mut cmd = dbtgate();
        cmd.arg("check-source-has-columns-by-group")
            .arg("--manifest")
            .arg(fixture_manifest())
            .args(["--columns", "a", "b", "d", "--column-cnt", cnt, "--", "models/tracking/sources.yml"]);
        cmd
    };

    run("2").assert().success();
    run("3")
        .assert()
        .code(1)
        .stdout("tracking.events: has only 2 column(s) from [a, b, d], but 3 are required.\n");
}

#[test]
fn missing_manifest_fails_before_checking() {
    dbtgate()
        .args([
            "check-model-has-tests-by-name",
            "--manifest",
            "does/not/exist/manifest.json",
            "--tests",
            "unique=1",
            "--",
            "models/model_x.sql",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("Unable to load manifest file ("));
}

#[test]
fn bad_requirement_is_a_usage_error() {
    dbtgate()
        .args(["check-model-has-tests-by-name", "--tests", "unique=one", "--", "models/model_x.sql"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to cast one to int."));
}

#[test]
fn manifest_from_stdin() {
    let manifest = std::fs::read_to_string(fixture_manifest()).unwrap();

    dbtgate()
        .args([
            "check-model-has-tests-by-name",
            "--manifest",
            "-",
            "--tests",
            "unique=2",
            "--",
            "models/orders.sql",
        ])
        .write_stdin(manifest)
        .assert()
        .code(1)
        .stdout("orders: has only 1 unique tests, but 2 are required.\n");
}

#[test]
fn writes_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.json");

    dbtgate()
        .arg("check-model-has-tests-by-name")
        .arg("--manifest")
        .arg(fixture_manifest())
        .arg("--report")
        .arg(&report_path)
        .args(["--tests", "unique=2", "--", "models/model_x.sql", "models/gone.sql"])
        .assert()
        .code(1);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["hook"], "check-model-has-tests-by-name");
    assert_eq!(report["version"]["major"], 1);
    assert_eq!(report["summary"]["errors"], 1);
    assert_eq!(report["summary"]["paths_missing"], 1);
    assert_eq!(report["diagnostics"][0]["code"], "PATH_NOT_IN_MANIFEST");
    assert_eq!(report["diagnostics"][1]["code"], "MODEL_TESTS_BELOW_MINIMUM");
}

#[test]
fn config_file_sets_manifest_and_severity() {
    let dir = tempfile::tempdir().unwrap();
    let config = format!(
        "manifest = {:?}\n\n[severity.overrides]\nMODEL_TESTS_BELOW_MINIMUM = \"warn\"\n",
        fixture_manifest().display().to_string()
    );
    std::fs::write(dir.path().join("dbtgate.toml"), config).unwrap();

    dbtgate()
        .current_dir(dir.path())
        .args(["check-model-has-tests-by-name", "--tests", "unique=2", "--", "models/model_x.sql"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn load_failure_is_recorded_in_report() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.json");
    let broken = dir.path().join("manifest.json");
    std::fs::write(&broken, "{ not json").unwrap();

    dbtgate()
        .arg("check-source-has-columns-by-group")
        .arg("--manifest")
        .arg(&broken)
        .arg("--report")
        .arg(&report_path)
        .args(["--columns", "a", "--column-cnt", "1", "--", "models/tracking/sources.yml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Unable to load manifest file (failed to parse manifest JSON"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["diagnostics"][0]["code"], "MANIFEST_LOAD_FAILED");
    assert_eq!(report["summary"]["errors"], 1);
}
