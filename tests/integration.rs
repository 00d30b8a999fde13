//! End-to-end tests driving the `rag` binary against a mock OpenAI server.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn rag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rag");
    path
}

/// A temp workspace plus the runtime hosting the mock; both must outlive the test.
struct TestEnv {
    _tmp: TempDir,
    _rt: Runtime,
    root: PathBuf,
    config_path: PathBuf,
}

fn write_config(root: &Path, openai_url: &str, extra: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/rag.sqlite"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = {dims}
url = "{url}"
api_key = "sk-test"

[chat]
provider = "openai"
model = "gpt-4o-mini"
url = "{url}"
api_key = "sk-test"

[index]
provider = "sqlite"

[server]
bind = "127.0.0.1:7341"
{extra}
"#,
        root = root.display(),
        dims = common::DIMS,
        url = openai_url,
        extra = extra,
    );

    let config_path = config_dir.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn setup_test_env() -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("nested")).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha\n\nRust programming with cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta\n\nPython and deep learning frameworks.",
    )
    .unwrap();
    fs::write(
        files_dir.join("nested").join("gamma.txt"),
        "Deploy services to kubernetes with docker.",
    )
    .unwrap();
    fs::write(files_dir.join("ignored.json"), "{\"rust\": true}").unwrap();

    let rt = Runtime::new().unwrap();
    let mock = rt.block_on(common::start_mock());
    let config_path = write_config(&root, &mock.openai_url(), "");

    TestEnv {
        _tmp: tmp,
        _rt: rt,
        root,
        config_path,
    }
}

fn run_rag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn added_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("added "))
        .unwrap_or_else(|| panic!("no id in output: {}", stdout))
        .trim()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let env = setup_test_env();

    let (stdout, stderr, success) = run_rag(&env.config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(env.root.join("data").join("rag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let env = setup_test_env();

    let (_, _, success1) = run_rag(&env.config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_rag(&env.config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_document_lifecycle() {
    let env = setup_test_env();
    run_rag(&env.config_path, &["init"]);

    let (stdout, stderr, success) = run_rag(&env.config_path, &["add", "Rust and cargo notes"]);
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
    let id = added_id(&stdout);

    let (stdout, _, _) = run_rag(&env.config_path, &["list"]);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("Rust and cargo notes"));

    let (stdout, stderr, success) =
        run_rag(&env.config_path, &["update", &id, "Docker deploy notes"]);
    assert!(success, "update failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(&format!("updated {}", id)));

    let (stdout, _, _) = run_rag(&env.config_path, &["list"]);
    assert!(stdout.contains("Docker deploy notes"));
    assert!(!stdout.contains("Rust and cargo notes"));

    let (stdout, _, _) = run_rag(&env.config_path, &["status"]);
    assert!(stdout.contains("documents: 1"));
    assert!(stdout.contains("indexed: 1"));
    assert!(stdout.contains("in sync: yes"));

    let (stdout, stderr, success) = run_rag(&env.config_path, &["delete", &id]);
    assert!(success, "delete failed: stdout={}, stderr={}", stdout, stderr);

    let (stdout, _, _) = run_rag(&env.config_path, &["list"]);
    assert!(stdout.contains("No documents."));

    let (stdout, _, _) = run_rag(&env.config_path, &["status"]);
    assert!(stdout.contains("indexed: 0"));
}

#[test]
fn test_unknown_document_fails() {
    let env = setup_test_env();
    run_rag(&env.config_path, &["init"]);

    let (_, stderr, success) = run_rag(&env.config_path, &["delete", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("document not found"));

    let (_, stderr, success) = run_rag(&env.config_path, &["update", "no-such-id", "text"]);
    assert!(!success);
    assert!(stderr.contains("document not found"));
}

#[test]
fn test_import_and_sync() {
    let env = setup_test_env();
    run_rag(&env.config_path, &["init"]);

    let files = env.root.join("files");
    let (stdout, stderr, success) =
        run_rag(&env.config_path, &["import", files.to_str().unwrap()]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("imported documents: 3"));
    assert!(!stdout.contains("ignored.json"));

    let (stdout, stderr, success) = run_rag(&env.config_path, &["sync"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("removed: 3"));
    assert!(stdout.contains("indexed: 3"));

    let (stdout, _, _) = run_rag(&env.config_path, &["status"]);
    assert!(stdout.contains("in sync: yes"));
}

#[test]
fn test_search_respects_k() {
    let env = setup_test_env();
    run_rag(&env.config_path, &["init"]);
    let files = env.root.join("files");
    run_rag(&env.config_path, &["import", files.to_str().unwrap()]);

    let (stdout, stderr, success) =
        run_rag(&env.config_path, &["search", "kubernetes deploy", "--k", "2"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    let results: Vec<&str> = stdout.lines().filter(|l| l.contains(". [")).collect();
    assert_eq!(results.len(), 2);
    assert!(stdout.contains("kubernetes"));
    assert!(stdout.starts_with("1. "));

    let (_, stderr, success) = run_rag(&env.config_path, &["search", "rust", "--k", "0"]);
    assert!(!success);
    assert!(stderr.contains("must be >= 1"));
}

#[test]
fn test_ask_uses_retrieved_context() {
    let env = setup_test_env();
    run_rag(&env.config_path, &["init"]);
    let files = env.root.join("files");
    run_rag(&env.config_path, &["import", files.to_str().unwrap()]);

    let (stdout, stderr, success) =
        run_rag(&env.config_path, &["ask", "how do I deploy to kubernetes?", "--k", "1"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("answer to 'how do I deploy to kubernetes?'"));
    assert!(stdout.contains("Deploy services to kubernetes with docker."));
    assert!(stdout.contains("sources:"));
}

#[test]
fn test_ask_empty_query_fails() {
    let env = setup_test_env();
    run_rag(&env.config_path, &["init"]);

    let (_, stderr, success) = run_rag(&env.config_path, &["ask", "   "]);
    assert!(!success);
    assert!(stderr.contains("must not be empty"));
}

#[test]
fn test_invalid_config_rejected() {
    let env = setup_test_env();
    let config_path = write_config(
        &env.root,
        "http://127.0.0.1:9/v1",
        "\n[retrieval]\ntop_k = 0\n",
    );

    let (_, stderr, success) = run_rag(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("top_k"), "stderr={}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_rag(&missing, &["status"]);
    assert!(!success);
    assert!(stderr.contains("config"), "stderr={}", stderr);
}
