use std::process::Command;

fn excore_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_excore"))
}

#[test]
fn init_writes_a_default_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let status = excore_bin()
        .current_dir(dir.path())
        .args(["init"])
        .status()
        .unwrap();
    assert!(status.success());
    assert!(dir.path().join(".excore.toml").is_file());
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".excore.toml"), "name = \"x\"\n").unwrap();
    let status = excore_bin()
        .current_dir(dir.path())
        .args(["init"])
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn quote_parses_a_toml_file_with_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("model.toml");
    std::fs::write(&config_path, "[Server]\nport = 8000\n").unwrap();

    let output = excore_bin()
        .args(["quote", config_path.to_str().unwrap(), "--override", "Server.enabled=true"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("\"Server\""));
}

#[test]
fn primary_fields_runs_against_a_default_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let status = excore_bin()
        .current_dir(dir.path())
        .args(["primary-fields"])
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn cache_dir_reports_a_created_directory() {
    let dir = tempfile::tempdir().unwrap();
    let output = excore_bin()
        .current_dir(dir.path())
        .args(["cache-dir"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let printed = String::from_utf8(output.stdout).unwrap();
    assert!(std::path::Path::new(printed.trim()).is_dir());
}
