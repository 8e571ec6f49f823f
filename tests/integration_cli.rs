// Drives the compiled binary's forced-evaluation mode. The live listening
// mode needs a TTY and is covered by the library integration tests instead.

use assert_cmd::Command;
use tempfile::tempdir;

fn scanlight() -> Command {
    Command::cargo_bin("scanlight").unwrap()
}

/// Points the binary at an empty config dir so a user's config file cannot
/// leak into the assertions.
fn isolated_config(cmd: &mut Command, dir: &std::path::Path) {
    cmd.arg("-c").arg(dir.join("config.json"));
}

#[test]
fn test_code_of_scan_length_succeeds() {
    let dir = tempdir().unwrap();
    let mut cmd = scanlight();
    isolated_config(&mut cmd, dir.path());
    cmd.arg("--test-code")
        .arg("4006381333931")
        .assert()
        .success()
        .stdout(predicates::str::contains("scan: 4006381333931 (presses: 1)"));
}

#[test]
fn short_test_code_is_rejected_with_exit_code() {
    let dir = tempdir().unwrap();
    let mut cmd = scanlight();
    isolated_config(&mut cmd, dir.path());
    cmd.arg("--test-code")
        .arg("12")
        .assert()
        .failure()
        .code(1)
        .stdout(predicates::str::contains(
            "string length should be greater or equal to 6",
        ));
}

#[test]
fn min_length_flag_overrides_default() {
    let dir = tempdir().unwrap();
    let mut cmd = scanlight();
    isolated_config(&mut cmd, dir.path());
    cmd.args(["-m", "20", "--test-code", "4006381333931"])
        .assert()
        .failure()
        .stdout(predicates::str::contains(
            "string length should be greater or equal to 20",
        ));
}

#[test]
fn config_file_supplies_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "min_length": 2 }"#).unwrap();

    scanlight()
        .arg("-c")
        .arg(&path)
        .args(["--test-code", "42"])
        .assert()
        .success()
        .stdout(predicates::str::contains("scan: 42"));
}

#[test]
fn help_lists_the_detector_flags() {
    scanlight()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("--min-length"))
        .stdout(predicates::str::contains("--avg-time-by-char"))
        .stdout(predicates::str::contains("--test-code"));
}
