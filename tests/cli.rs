use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn aids_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_aids"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"
[api]
url = "http://127.0.0.1:9/graphql"
max_retries = 0

[storage]
stories_path = "{root}/stories.json"
scenarios_path = "{root}/scenarios.json"
backups_dir = "{root}/backups"
"#,
        root = root.display()
    );
    let config_path = config_dir.join("aids.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_aids(config: &Path, args: &[&str]) -> Output {
    Command::new(aids_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("AIDS_USERNAME")
        .env_remove("AIDS_PASSWORD")
        .output()
        .expect("failed to run aids")
}

#[test]
fn test_status_reports_files_and_backups() {
    let (tmp, config) = setup_test_env();
    let root = tmp.path();

    fs::write(
        root.join("stories.json"),
        r#"[{"publicId": "a", "title": "Epic", "actions": [1, 2]},
            {"publicId": "b", "title": "Saga", "actions": [1]}]"#,
    )
    .unwrap();
    fs::create_dir_all(root.join("backups")).unwrap();
    fs::write(
        root.join("backups").join("scenarios_20240101T000000.000000Z_x.json"),
        "[]",
    )
    .unwrap();

    let output = run_aids(&config, &["status"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let rows: Vec<Vec<&str>> = stdout
        .lines()
        .skip(1)
        .map(|line| line.split_whitespace().collect())
        .collect();
    assert_eq!(rows[0][..3], ["stories", "2", "0"]);
    assert_eq!(rows[1][..3], ["scenarios", "-", "1"]);
}

#[test]
fn test_harvest_without_credentials_fails() {
    let (_tmp, config) = setup_test_env();

    let output = run_aids(&config, &["stories"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("AIDS_USERNAME"));
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config) = setup_test_env();
    fs::write(&config, "[storage]\nmax_backups = 0\n").unwrap();

    let output = run_aids(&config, &["status"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_backups"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let output = Command::new(aids_binary())
        .current_dir(tmp.path())
        .args(["--config", "absent.toml", "status"])
        .output()
        .expect("failed to run aids");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stories.json"));
    assert!(stdout.contains("scenarios.json"));
}

#[test]
fn test_completions_print_script() {
    let output = Command::new(aids_binary())
        .args(["completions", "bash"])
        .output()
        .expect("failed to run aids");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("aids"));
    assert!(stdout.contains("complete"));
}

#[test]
fn test_makenai_then_makejson_round_trip() {
    let (tmp, config) = setup_test_env();
    let root = tmp.path();
    let nai_dir = root.join("nai");

    fs::write(
        root.join("scenarios.json"),
        r#"[{"publicId": "a", "title": "Castle", "prompt": "You stand at the gate.",
             "memory": "You are a knight.", "authorsNote": "Grim.",
             "worldInfo": [{"keys": "king", "entry": "The old king."}]}]"#,
    )
    .unwrap();

    let nai_dir_arg = nai_dir.to_string_lossy().to_string();
    let output = run_aids(&config, &["makenai", "--out-dir", &nai_dir_arg]);
    assert!(output.status.success());
    let written: Vec<_> = fs::read_dir(&nai_dir).unwrap().collect();
    assert_eq!(written.len(), 1);

    let out = root.join("converted.json").to_string_lossy().to_string();
    let output = run_aids(&config, &["makejson", "--dir", &nai_dir_arg, "--out", &out]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("converted: 1"));

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("converted.json")).unwrap()).unwrap();
    assert_eq!(raw[0]["title"], "Castle");
    assert_eq!(raw[0]["memory"], "You are a knight.");
    assert_eq!(raw[0]["authorsNote"], "Grim.");
    assert_eq!(raw[0]["worldInfo"][0]["entry"], "The old king.");
}
