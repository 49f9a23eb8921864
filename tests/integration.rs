use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn evrag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_evrag"))
}

const EVENTS_JSON: &str = r#"{
  "events": [
    {
      "id": 1,
      "name": "Fall Festival",
      "long_description": "Outdoor festival downtown with food stalls and live music.",
      "area": "Shibuya",
      "category": "festival",
      "start_datetime": "2099-10-12T10:00:00Z",
      "end_datetime": "2099-10-12T18:00:00Z",
      "website_url": "https://example.com/fall"
    },
    {
      "id": 2,
      "name": "Art Workshop",
      "description": "Indoor art class for beginners.",
      "area": "Ueno"
    },
    {
      "id": 3,
      "name": "",
      "description": "   "
    }
  ]
}"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    setup_with_config("")
}

/// Temp workspace with a config file; `extra` is appended to the TOML.
fn setup_with_config(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(root.join("events.json"), EVENTS_JSON).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/evrag.sqlite"

[chunking]
chunk_chars = 20

[server]
bind = "127.0.0.1:7341"
{}
"#,
        root.display(),
        extra
    );

    let config_path = config_dir.join("evrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_evrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = evrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run evrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn events_path(config_path: &Path) -> String {
    config_path
        .parent()
        .and_then(Path::parent)
        .unwrap()
        .join("events.json")
        .display()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_evrag(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/evrag.sqlite").exists());

    // Idempotent
    let (_, stderr, ok) = run_evrag(&config, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_import_then_stats() {
    let (_tmp, config) = setup_test_env();
    run_evrag(&config, &["init"]);

    let (stdout, stderr, ok) = run_evrag(&config, &["import", &events_path(&config)]);
    assert!(ok, "import failed: {}", stderr);
    assert!(stdout.contains("Imported 3 events"));

    let (stdout, stderr, ok) = run_evrag(&config, &["stats"]);
    assert!(ok, "stats failed: {}", stderr);
    assert!(stdout.contains("Events:      3"), "stdout: {}", stdout);
    assert!(stdout.contains("Vectors:     0"), "stdout: {}", stdout);
    assert!(stdout.contains("Upcoming:    1"), "stdout: {}", stdout);
}

#[test]
fn test_reimport_replaces_by_id() {
    let (_tmp, config) = setup_test_env();
    let path = events_path(&config);
    run_evrag(&config, &["import", &path]);
    let (_, stderr, ok) = run_evrag(&config, &["import", &path]);
    assert!(ok, "re-import failed: {}", stderr);

    let (stdout, _, _) = run_evrag(&config, &["stats"]);
    assert!(stdout.contains("Events:      3"), "stdout: {}", stdout);
}

#[test]
fn test_reindex_dry_run_reports_chunks() {
    let (_tmp, config) = setup_test_env();
    run_evrag(&config, &["import", &events_path(&config)]);

    let (stdout, stderr, ok) = run_evrag(&config, &["reindex", "--dry-run"]);
    assert!(ok, "dry run failed: {}", stderr);
    assert!(stdout.contains("Events:          3"), "stdout: {}", stdout);
    assert!(stdout.contains("Indexable:       2"), "stdout: {}", stdout);
    assert!(stdout.contains("Skipped (empty): 1"), "stdout: {}", stdout);
    assert!(stdout.contains("Chunk size:      20 chars"));

    // Nothing was written
    let (stdout, _, _) = run_evrag(&config, &["stats"]);
    assert!(stdout.contains("Vectors:     0"));
}

#[test]
fn test_reindex_requires_events() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_evrag(&config, &["reindex"]);
    assert!(!ok);
    assert!(stderr.contains("No events in the database"), "stderr: {}", stderr);
}

#[test]
fn test_reindex_with_disabled_provider_fails() {
    let (_tmp, config) = setup_test_env();
    run_evrag(&config, &["import", &events_path(&config)]);

    let (_, stderr, ok) = run_evrag(&config, &["reindex"]);
    assert!(!ok);
    assert!(stderr.contains("Embedding provider is disabled"), "stderr: {}", stderr);
}

#[test]
fn test_ask_with_disabled_provider_fails_at_embedding() {
    let (_tmp, config) = setup_test_env();
    run_evrag(&config, &["import", &events_path(&config)]);

    let (stdout, stderr, ok) = run_evrag(&config, &["ask", "outdoor festival"]);
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(stderr.contains("embedding stage failed"), "stderr: {}", stderr);
}

#[test]
fn test_ask_rejects_out_of_range_top_k() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_evrag(&config, &["ask", "festival", "--top-k", "51"]);
    assert!(!ok);
    assert!(stderr.contains("topK must be between 1 and 50"), "stderr: {}", stderr);
}

#[test]
fn test_openai_provider_without_key_fails() {
    let (_tmp, config) = setup_with_config("\n[embedding]\nprovider = \"openai\"\n");
    run_evrag(&config, &["import", &events_path(&config)]);

    let (_, stderr, ok) = run_evrag(&config, &["reindex"]);
    assert!(!ok);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config) = setup_with_config("\n[retrieval]\ntop_k = 80\n");
    let (_, stderr, ok) = run_evrag(&config, &["stats"]);
    assert!(!ok);
    assert!(stderr.contains("retrieval.top_k"), "stderr: {}", stderr);
}

#[test]
fn test_import_rejects_malformed_file() {
    let (tmp, config) = setup_test_env();
    let bad = tmp.path().join("bad.json");
    fs::write(&bad, "{\"events\": [{\"name\": \"no id\"}]}").unwrap();

    let (_, stderr, ok) = run_evrag(&config, &["import", bad.to_str().unwrap()]);
    assert!(!ok);
    assert!(stderr.contains("Failed to parse events JSON"), "stderr: {}", stderr);
}
