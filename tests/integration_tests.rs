use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

fn wmach() -> Command {
    Command::cargo_bin("wmach").unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("wmach-{}-{}", std::process::id(), name))
}

#[test]
fn runs_without_arguments() {
    wmach().assert().success().stdout(contains("wmach"));
}

#[test]
fn checks_program() {
    wmach()
        .arg("check")
        .arg("tests/files/countdown.asm")
        .assert()
        .success()
        .stdout(contains("Success"))
        .stdout(contains("6 entries"));
}

#[test]
fn runs_countdown() {
    wmach()
        .arg("run")
        .arg("tests/files/countdown.asm")
        .assert()
        .success()
        .stdout(contains("Halted"));
}

#[test]
fn runs_hello_with_io() {
    wmach()
        .arg("run")
        .arg("tests/files/hello.asm")
        .arg("--minimal")
        .arg("--features")
        .arg("io")
        .assert()
        .success()
        .stdout(contains("Hi\n"));
}

#[test]
fn features_come_from_environment() {
    wmach()
        .arg("run")
        .arg("tests/files/hello.asm")
        .arg("--minimal")
        .env("WMACH_FEATURES", "io,stack")
        .assert()
        .success()
        .stdout(contains("Hi"));
}

#[test]
fn rejects_bad_environment_features() {
    wmach()
        .arg("check")
        .arg("tests/files/countdown.asm")
        .env("WMACH_FEATURES", "turbo")
        .assert()
        .failure()
        .stderr(contains("turbo"));
}

#[test]
fn echoes_input() {
    wmach()
        .arg("run")
        .arg("tests/files/echo.asm")
        .arg("--minimal")
        .arg("--features=io")
        .arg("--input")
        .arg("abc")
        .assert()
        .success()
        .stdout(contains("abc"));
}

#[test]
fn io_instruction_needs_feature() {
    wmach()
        .arg("check")
        .arg("tests/files/hello.asm")
        .assert()
        .failure()
        .stderr(contains("gen::bad_template"));
}

#[test]
fn reports_undefined_symbol() {
    wmach()
        .arg("check")
        .arg("tests/files/undefined.asm")
        .assert()
        .failure()
        .stderr(contains("sema::undefined_symbol"))
        .stderr(contains("value"));
}

#[test]
fn empty_program_is_rejected() {
    wmach()
        .arg("check")
        .arg("tests/files/empty.asm")
        .assert()
        .failure()
        .stderr(contains("compile::empty"));
}

#[test]
fn unknown_extension_is_rejected() {
    wmach()
        .arg("check")
        .arg("tests/files/double.json")
        .assert()
        .failure()
        .stderr(contains("unknown extension"));
}

#[test]
fn runs_micro_assembly() {
    wmach()
        .arg("run")
        .arg("tests/files/fetch.mic")
        .assert()
        .success()
        .stdout(contains("Halted"));
}

#[test]
fn phase_limit_stops_run() {
    wmach()
        .arg("run")
        .arg("tests/files/echo.asm")
        .arg("--features")
        .arg("io")
        .arg("--max-phases")
        .arg("2")
        .assert()
        .success()
        .stdout(contains("phase limit"));
}

#[test]
fn custom_instruction_table() {
    wmach()
        .arg("run")
        .arg("tests/files/double.asm")
        .arg("--commands")
        .arg("tests/files/double.json")
        .assert()
        .success()
        .stdout(contains("Halted"));

    wmach()
        .arg("check")
        .arg("tests/files/double.asm")
        .assert()
        .failure()
        .stderr(contains("sema::unknown_instruction"));
}

#[test]
fn compiles_to_micro_assembly_and_back() {
    let dest = temp_path("countdown.mic");
    wmach()
        .arg("compile")
        .arg("tests/files/countdown.asm")
        .arg("--dest")
        .arg(&dest)
        .assert()
        .success()
        .stdout(contains("Saved"));

    let text = std::fs::read_to_string(&dest).unwrap();
    assert!(text.contains("czyt wei il;"));
    assert!(text.contains("STP"));
    assert!(text.contains(".entry 0 6"));
    assert!(text.contains(".jump 0"));
    assert!(text.contains(".data 6 3 1"));

    wmach()
        .arg("check")
        .arg(&dest)
        .assert()
        .success()
        .stdout(contains("6 entries"));

    let debug = |file: &std::path::Path| {
        wmach()
            .arg("debug")
            .arg(file)
            .arg("--minimal")
            .arg("--command")
            .arg("run; registers; memory 6")
            .output()
            .unwrap()
    };
    let source = debug(std::path::Path::new("tests/files/countdown.asm"));
    let rendered = debug(&dest);
    assert!(String::from_utf8_lossy(&source.stderr).contains("0x0006  0"));
    assert_eq!(source.stderr, rendered.stderr);
    std::fs::remove_file(&dest).unwrap();
}

#[test]
fn repeated_table_entry_is_rejected() {
    wmach()
        .arg("check")
        .arg("tests/files/double.asm")
        .arg("--commands")
        .arg("tests/files/repeated.json")
        .assert()
        .failure()
        .stderr(contains("registry::duplicate"));
}

#[test]
fn compiles_and_runs_snapshot() {
    let dest = temp_path("hello.json");
    wmach()
        .arg("compile")
        .arg("tests/files/hello.asm")
        .arg("--features")
        .arg("io")
        .arg("--snapshot")
        .arg("--dest")
        .arg(&dest)
        .assert()
        .success();

    let json = std::fs::read_to_string(&dest).unwrap();
    assert!(json.contains("\"version\": 1"));

    wmach()
        .arg("run")
        .arg(&dest)
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("Hi"));
    std::fs::remove_file(&dest).unwrap();
}

#[test]
fn refuses_to_overwrite_source() {
    wmach()
        .arg("compile")
        .arg("tests/files/fetch.mic")
        .assert()
        .failure()
        .stderr(contains("overwrite").and(contains("--dest")));
}
