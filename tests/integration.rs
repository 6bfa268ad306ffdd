use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn scribe_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_scribe"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let repo = root.join("repo");
    fs::create_dir_all(repo.join("pkg")).unwrap();
    fs::create_dir_all(repo.join("venv/lib")).unwrap();
    fs::write(
        repo.join("pkg/app.py"),
        "# entry point\nclass App:\n    \"\"\"Main app.\"\"\"\n    def run(self):\n        pass\n",
    )
    .unwrap();
    fs::write(repo.join("main.go"), "package main\n\n// Add adds\nfunc Add(a int) int {\n\treturn a\n}\n").unwrap();
    fs::write(repo.join("app.pyc"), "compiled").unwrap();
    fs::write(repo.join("venv/lib/site.py"), "x = 1\n").unwrap();
    fs::write(repo.join("run.sh"), "#!/bin/sh\necho hi\n").unwrap();

    let config_content = format!(
        r#"[source]
kind = "filesystem"
root = "{root}/repo"

[chunking]
chunk_size = 40

[generation]
provider = "disabled"
max_attempts = 1

[output]
documentation = "{root}/out/documentation.json"
corpus = "{root}/out/organized_files.json"
metadata = "{root}/out/file_metadata.json"
structure = "{root}/out/file_structure.json"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("scribe.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_scribe(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = scribe_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run scribe binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_organize_writes_snapshot() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_scribe(&config_path, &["organize"]);
    assert!(success, "organize failed: {}", stderr);
    assert!(stdout.contains("files: 2"), "unexpected output: {}", stdout);
    assert!(stdout.contains("skipped: 3"), "unexpected output: {}", stdout);

    let snapshot = read_json(&tmp.path().join("out/organized_files.json"));
    assert_eq!(snapshot["Python"][0][0], "pkg/app.py");
    assert_eq!(snapshot["Go"][0][0], "main.go");
}

#[test]
fn test_metadata_and_structure() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_scribe(&config_path, &["metadata"]);
    assert!(success, "metadata failed: {}", stderr);
    let (_, stderr, success) = run_scribe(&config_path, &["structure"]);
    assert!(success, "structure failed: {}", stderr);

    let metadata = read_json(&tmp.path().join("out/file_metadata.json"));
    assert!(metadata["pkg/app.py"]["size"].as_u64().unwrap() > 0);
    assert!(metadata.get("venv/lib/site.py").is_none());

    let structure = read_json(&tmp.path().join("out/file_structure.json"));
    assert!(structure["pkg"]["app.py"].is_null());
    assert!(structure.get("venv").is_none());
}

#[test]
fn test_analyze_single_file() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("repo/pkg/app.py");

    let (stdout, stderr, success) = run_scribe(&config_path, &["analyze", file.to_str().unwrap()]);
    assert!(success, "analyze failed: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["language"], "Python");
    assert_eq!(json["elements"]["functions"][0], "run");
    assert_eq!(json["elements"]["classes"][0], "App");
    assert_eq!(json["elements"]["comments"][0], "# entry point");
}

#[test]
fn test_analyze_unsupported_language_fails() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("notes.zzz-none");
    fs::write(&file, "just words").unwrap();

    let (_, stderr, success) = run_scribe(&config_path, &["analyze", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("no extractor available for language: Unknown"), "stderr: {}", stderr);
}

#[test]
fn test_document_dry_run() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_scribe(&config_path, &["document", "--dry-run", "--hierarchical", "--progress", "off"]);
    assert!(success, "document failed: {}", stderr);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("files ingested: 2"));
    assert!(!tmp.path().join("out/documentation.json").exists());
}

#[test]
fn test_document_with_disabled_provider_records_failures() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_scribe(&config_path, &["document", "--progress", "off"]);
    assert!(success, "document failed: {}", stderr);

    let doc = read_json(&tmp.path().join("out/documentation.json"));
    assert_eq!(doc["model"], "disabled");
    assert_eq!(doc["hierarchical"], false);
    assert_eq!(doc["artifacts"].as_array().unwrap().len(), 0);

    let chunks = doc["report"]["chunks"].as_u64().unwrap();
    assert!(chunks >= 2);
    assert_eq!(doc["failures"].as_array().unwrap().len() as u64, chunks);
    assert_eq!(doc["failures"][0]["cause"], "generation provider is disabled");
    assert_eq!(doc["elements"]["main.go"]["functions"][0], "Add");

    // every failure is listed and the run is not reported as ok
    assert!(
        stdout.contains("main.go#0 after 1 attempt(s): generation provider is disabled"),
        "stdout: {}",
        stdout
    );
    assert!(stdout.contains("pkg/app.py#0"), "stdout: {}", stdout);
    assert!(
        stdout.contains(&format!("completed with {} generation failures", chunks)),
        "stdout: {}",
        stdout
    );
    assert!(!stdout.lines().any(|l| l.trim() == "ok"));
}

#[test]
fn test_document_reuses_corpus_snapshot() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_scribe(&config_path, &["organize"]);
    assert!(success, "organize failed: {}", stderr);
    fs::remove_file(tmp.path().join("repo/pkg/app.py")).unwrap();

    let (stdout, stderr, success) = run_scribe(
        &config_path,
        &["document", "--dry-run", "--from-snapshot", "--progress", "off"],
    );
    assert!(success, "document failed: {}", stderr);
    // the snapshot still holds both files
    assert!(stdout.contains("files ingested: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("files skipped: 0"), "stdout: {}", stdout);
}

#[test]
fn test_from_snapshot_without_corpus_path_fails() {
    let (tmp, _) = setup_test_env();
    let cfg = tmp.path().join("config/no_corpus.toml");
    fs::write(
        &cfg,
        format!(
            "[source]\nkind = \"filesystem\"\nroot = \"{}/repo\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_scribe(&cfg, &["document", "--dry-run", "--from-snapshot"]);
    assert!(!success);
    assert!(stderr.contains("[output] corpus"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        "[source]\nkind = \"filesystem\"\nroot = \".\"\n\n[chunking]\nchunk_size = 0\n",
    )
    .unwrap();

    let (_, stderr, success) = run_scribe(&bad, &["organize"]);
    assert!(!success);
    assert!(stderr.contains("chunk_size"), "stderr: {}", stderr);
}

#[test]
fn test_missing_source_root_fails() {
    let (tmp, _) = setup_test_env();
    let cfg = tmp.path().join("config/missing.toml");
    fs::write(
        &cfg,
        format!(
            "[source]\nkind = \"filesystem\"\nroot = \"{}/nope\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_scribe(&cfg, &["organize"]);
    assert!(!success);
    assert!(stderr.contains("does not exist"), "stderr: {}", stderr);
}
