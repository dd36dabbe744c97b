use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn cnf_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

fn dpll() -> Command {
    Command::cargo_bin("dpll-sat").unwrap()
}

fn walk() -> Command {
    Command::cargo_bin("walk-sat").unwrap()
}

#[test]
fn test_dpll_single_solution() {
    let file = cnf_file("p cnf 1 1\n1 0\n");
    dpll()
        .arg(file.path())
        .assert()
        .success()
        .stdout("0 1 0\n");
}

#[test]
fn test_dpll_unsatisfiable_exits_zero() {
    let file = cnf_file("p cnf 1 2\n1 0\n-1 0\n");
    dpll().arg(file.path()).assert().success().stdout("");
}

#[test]
fn test_dpll_enumerates_under_budget() {
    let file = cnf_file("p cnf 3 2\n1 2 0\n-1 -2 0\n");
    let assert = dpll()
        .arg(file.path())
        .arg("1")
        .arg("2")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.lines().count(), 8);
    for line in stdout.lines() {
        assert!(line.ends_with(" 0"));
    }
}

#[test]
fn test_dpll_parse_failure_exits_nonzero() {
    let file = cnf_file("p cnf 2 1\n1 spam 0\n");
    dpll()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("DIMACS"));
}

#[test]
fn test_dpll_missing_file_exits_nonzero() {
    dpll()
        .arg("/nonexistent/input.cnf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_dpll_verbose_prints_stats() {
    let file = cnf_file("p cnf 2 1\n1 2 0\n");
    dpll()
        .arg(file.path())
        .args(["0", "1", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("decisions"));
}

#[test]
fn test_walksat_finds_unit_solution() {
    let file = cnf_file("p cnf 1 1\n1 0\n");
    walk()
        .arg(file.path())
        .args(["100", "0.5", "0", "7"])
        .assert()
        .success()
        .stdout("0 1 0\n");
}

#[test]
fn test_walksat_reports_cutoff_miss() {
    // contradictory units: target 0 is unreachable, deadline expires
    let file = cnf_file("p cnf 1 2\n1 0\n-1 0\n");
    walk()
        .arg(file.path())
        .args(["50", "0.5", "0", "3", "0.2"])
        .assert()
        .success()
        .stdout("no solution within cutoff\n");
}

#[test]
fn test_walksat_rejects_bad_probability() {
    let file = cnf_file("p cnf 1 1\n1 0\n");
    walk()
        .arg(file.path())
        .args(["100", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("probability"));
}
