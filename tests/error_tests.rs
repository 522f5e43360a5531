//! Exit codes and error reporting through `run_app`.

use clap::Parser;
use linkvault::cli::Cli;
use linkvault::error::{ExitCode, StructuredError};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn cli(args: &[&str]) -> Cli {
    let mut full = vec!["linkvault", "--quiet"];
    full.extend_from_slice(args);
    Cli::try_parse_from(full).unwrap()
}

#[test]
fn test_exit_code_nothing_to_do() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    let lib = dir.path().join("lib");

    let result = linkvault::run_app(cli(&[
        "dedupe",
        src.to_str().unwrap(),
        "--library",
        lib.to_str().unwrap(),
    ]))
    .unwrap();

    assert_eq!(result, ExitCode::NothingToDo);
}

#[test]
fn test_exit_code_success_with_duplicates() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"dup");
    write(&src.join("b.jpg"), b"dup");

    let result = linkvault::run_app(cli(&[
        "dedupe",
        src.to_str().unwrap(),
        "--library",
        lib.to_str().unwrap(),
        "--pattern",
        "*.jpg",
    ]))
    .unwrap();

    assert_eq!(result, ExitCode::Success);
    assert!(lib.is_dir());
}

#[test]
fn test_dry_run_through_cli_leaves_library_absent() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    write(&src.join("a.jpg"), b"dup");
    write(&src.join("b.jpg"), b"dup");

    let result = linkvault::run_app(cli(&[
        "--dry-run",
        "dedupe",
        src.to_str().unwrap(),
        "--library",
        lib.to_str().unwrap(),
    ]))
    .unwrap();

    assert_eq!(result, ExitCode::Success);
    assert!(!lib.exists());
}

#[test]
fn test_log_file_records_decisions() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let lib = dir.path().join("lib");
    let log = dir.path().join("logs").join("run.log");
    write(&src.join("a.jpg"), b"logged");

    let result = linkvault::run_app(cli(&[
        "--log-file",
        log.to_str().unwrap(),
        "dedupe",
        src.to_str().unwrap(),
        "--library",
        lib.to_str().unwrap(),
    ]))
    .unwrap();

    assert_eq!(result, ExitCode::Success);
    assert!(log.is_file());
}

#[test]
fn test_cleanup_with_yes_reports_nothing_to_do_on_empty_library() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("lib");
    fs::create_dir_all(&lib).unwrap();

    let result =
        linkvault::run_app(cli(&["cleanup", "--library", lib.to_str().unwrap(), "--yes"])).unwrap();
    assert_eq!(result, ExitCode::NothingToDo);
}

#[test]
fn test_cleanup_missing_library_maps_to_nothing_to_do() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("absent");

    let err = linkvault::run_app(cli(&["cleanup", "--library", lib.to_str().unwrap(), "--yes"]))
        .unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::NothingToDo);
}

#[test]
fn test_missing_explicit_config_is_a_general_error() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("nope.toml");

    let err = linkvault::run_app(cli(&[
        "--config",
        config.to_str().unwrap(),
        "cleanup",
        "--library",
        dir.path().to_str().unwrap(),
    ]))
    .unwrap_err();

    let code = ExitCode::for_error(&err);
    assert_eq!(code, ExitCode::GeneralError);

    let structured = StructuredError::new(&err, code);
    assert_eq!(structured.code, "LV001");
    assert!(structured.message.contains("config file not found"));
}
