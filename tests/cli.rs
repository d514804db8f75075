use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn campus_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_campus"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("placements.txt"),
        "Placement season starts in August.\n\nOver forty companies visited the campus last year, \
         including product and service firms.\n\nThe highest package offered was 24 LPA.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/campus.sqlite"

[embedding]
provider = "hash"

[index]
dimension = 128

[images]
root = "{root}/data/images"

[logging]
filter = "warn"
"#,
        root = root.display()
    );
    let config_path = config_dir.join("campus.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_campus(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(campus_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run campus binary");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init_creates_database_and_image_root() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_campus(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized"));
    assert!(tmp.path().join("data/campus.sqlite").exists());
    assert!(tmp.path().join("data/images").is_dir());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    assert!(run_campus(&config, &["init"]).2);
    let (_, stderr, success) = run_campus(&config, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_index_then_stats_and_wipe() {
    let (tmp, config) = setup_test_env();
    run_campus(&config, &["init"]);

    let file = tmp.path().join("files/placements.txt");
    let (stdout, stderr, success) = run_campus(
        &config,
        &["index", file.to_str().unwrap(), "--category", "Placements"],
    );
    assert!(success, "index failed: {}", stderr);
    assert!(stdout.contains("Namespace:   placements"));

    let (stdout, _, success) = run_campus(&config, &["stats"]);
    assert!(success);
    assert!(stdout.contains("placements"));

    let (stdout, _, success) = run_campus(&config, &["wipe", "placements"]);
    assert!(success);
    assert!(stdout.contains("Wiped namespace placements"));

    let (stdout, _, _) = run_campus(&config, &["stats"]);
    assert!(stdout.contains("(index is empty)"));
}

#[test]
fn test_ask_greeting_without_model() {
    let (_tmp, config) = setup_test_env();
    run_campus(&config, &["init"]);
    let (stdout, stderr, success) = run_campus(&config, &["ask", "hello"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("Category:    greeting"));
}

#[test]
fn test_ask_without_matches_prints_no_information() {
    let (_tmp, config) = setup_test_env();
    run_campus(&config, &["init"]);
    let (stdout, stderr, success) = run_campus(&config, &["ask", "asdkjasdkj random gibberish"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("couldn't find any relevant information"));
}

#[test]
fn test_ask_no_rag_fails_with_disabled_model() {
    let (_tmp, config) = setup_test_env();
    run_campus(&config, &["init"]);
    let (_, stderr, success) = run_campus(&config, &["ask", "Explain recursion", "--no-rag"]);
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_index_missing_file_errors() {
    let (_tmp, config) = setup_test_env();
    run_campus(&config, &["init"]);
    let (_, stderr, success) = run_campus(&config, &["index", "/nonexistent/file.txt"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read"));
}

#[test]
fn test_invalid_config_errors() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(&bad, "[db]\npath = \"x.sqlite\"\n[retrieval]\ntop_k = 0\n").unwrap();
    let (_, stderr, success) = run_campus(&bad, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("top_k"));
}

#[test]
fn test_completions_need_no_config() {
    let (stdout, _, success) = run_campus(Path::new("/nonexistent.toml"), &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("campus"));
}
