//! End-to-end CLI tests, driving the real `fax` binary against fixture
//! source files rather than calling into `fax-driver`'s library API.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn fax_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fax"))
}

#[test]
fn help_flag_lists_usage() {
    Command::new(fax_bin())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage").or(predicate::str::contains("fax")));
}

#[test]
fn version_flag_prints_crate_version() {
    Command::new(fax_bin())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn runs_a_hello_world_script() {
    Command::new(fax_bin())
        .arg(fixtures_dir().join("hello_world.fax"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, world!"));
}

#[test]
fn runs_a_script_with_classes_and_methods() {
    Command::new(fax_bin())
        .arg(fixtures_dir().join("classes.fax"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, fax!"));
}

#[test]
fn compile_error_exits_65_and_reports_to_stderr() {
    Command::new(fax_bin())
        .arg(fixtures_dir().join("compile_error.fax"))
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn runtime_error_exits_70_with_a_stack_trace() {
    Command::new(fax_bin())
        .arg(fixtures_dir().join("runtime_error.fax"))
        .assert()
        .code(70)
        .stderr(predicate::str::contains("in a()").and(predicate::str::contains("in b()")));
}

#[test]
fn missing_file_exits_74() {
    Command::new(fax_bin())
        .arg(fixtures_dir().join("does_not_exist.fax"))
        .assert()
        .code(74)
        .stderr(predicate::str::contains("Could not open file"));
}

#[test]
fn two_or_more_paths_exit_64_with_usage_message() {
    Command::new(fax_bin())
        .arg(fixtures_dir().join("hello_world.fax"))
        .arg(fixtures_dir().join("classes.fax"))
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Usage: fax [path]"));
}

#[test]
fn gc_stress_flag_still_runs_scripts_to_completion() {
    Command::new(fax_bin())
        .arg("--gc-stress")
        .arg(fixtures_dir().join("classes.fax"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, fax!"));
}
