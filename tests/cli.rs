use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("globe-etl").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("globe-etl"))
        .stdout(predicate::str::contains("refresh"));
}

#[test]
fn view_on_fresh_database_reports_empty() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("global_data.db");
    let mut cmd = Command::cargo_bin("globe-etl").unwrap();
    cmd.arg("--db").arg(&db).arg("view");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Database is empty."));
    assert!(db.exists());
}

#[test]
fn empty_query_runs_without_touching_the_network() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("global_data.db");
    let mut cmd = Command::cargo_bin("globe-etl").unwrap();
    cmd.args(["run", "", "--no-csv"]).arg("--db").arg(&db);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Total countries processed: 0"));
}

#[test]
fn export_json_of_empty_store_is_an_empty_array() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("global_data.db");
    let out = dir.path().join("out/countries.json");
    let mut cmd = Command::cargo_bin("globe-etl").unwrap();
    cmd.arg("--db")
        .arg(&db)
        .args(["export", "--out"])
        .arg(&out);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Exported 0 rows"));
    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(v, serde_json::json!([]));
}

#[test]
fn clean_without_database_is_a_no_op() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("missing.db");
    let mut cmd = Command::cargo_bin("globe-etl").unwrap();
    cmd.arg("--db").arg(&db).args(["clean", "--yes"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No database found"));
    assert!(!db.exists());
}

#[test]
fn info_lists_configured_database() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("info.db");
    let mut cmd = Command::cargo_bin("globe-etl").unwrap();
    cmd.arg("--db").arg(&db).arg("info");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("info.db"))
        .stdout(predicate::str::contains("Countries API"));
}

#[test]
fn invalid_timeout_is_rejected() {
    let mut cmd = Command::cargo_bin("globe-etl").unwrap();
    cmd.env("GLOBE_COUNTRY_TIMEOUT_SECS", "soon").arg("info");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("GLOBE_COUNTRY_TIMEOUT_SECS"));
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn run_online_for_single_country() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("global_data.db");
    let csv = dir.path().join("summary.csv");
    let mut cmd = Command::cargo_bin("globe-etl").unwrap();
    cmd.arg("--db")
        .arg(&db)
        .args(["run", "Iceland", "--csv"])
        .arg(&csv);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Iceland"));
    assert!(csv.exists());
}
