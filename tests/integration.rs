//! Integration tests that drive the `sieve` binary end to end.
//!
//! The embedding provider is the offline feature-hashing model, so no
//! network access or API keys are needed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sieve_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sieve");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("alice.txt"),
        "Senior Rust engineer. Built async services with tokio and sqlx, \
         designed ingestion pipelines, and maintains open source crates.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("bob.txt"),
        "Rust backend engineer with tokio and postgres experience. \
         Contributed to open source projects and mentored juniors.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/sieve.sqlite"

[embedding]
provider = "hash"
fallback_dims = 128
"#,
        root.display()
    );
    let config_path = config_dir.join("sieve.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run(config: &Path, args: &[&str]) -> std::process::Output {
    Command::new(sieve_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run sieve binary")
}

#[test]
fn init_is_idempotent() {
    let (tmp, config) = setup_test_env();

    let first = run(&config, &["init"]);
    assert!(first.status.success(), "{:?}", first);
    let second = run(&config, &["init"]);
    assert!(second.status.success(), "{:?}", second);

    assert!(tmp.path().join("data").join("sieve.sqlite").exists());
}

#[test]
fn analyze_reports_cache_miss_then_hit() {
    let (tmp, config) = setup_test_env();
    run(&config, &["init"]);

    let doc = tmp.path().join("docs").join("alice.txt");
    let doc_arg = doc.to_string_lossy();

    let first = run(&config, &["analyze", &doc_arg]);
    assert!(first.status.success(), "{:?}", first);
    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("cache: miss"), "{}", stdout);
    assert!(stdout.contains("chunks:"), "{}", stdout);
    assert!(stdout.contains("ok"), "{}", stdout);

    let second = run(&config, &["analyze", &doc_arg]);
    assert!(second.status.success(), "{:?}", second);
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(stdout.contains("cache: hit"), "{}", stdout);
}

#[test]
fn keywords_lists_ranked_tokens() {
    let (tmp, config) = setup_test_env();
    let doc = tmp.path().join("docs").join("alice.txt");

    let output = run(&config, &["keywords", &doc.to_string_lossy()]);
    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rust"), "{}", stdout);
    assert!(!stdout.contains("\nand\n"), "stopword leaked: {}", stdout);
}

#[test]
fn cache_check_reports_snapshot_diff() {
    let (tmp, config) = setup_test_env();
    run(&config, &["init"]);

    let repo = tmp.path().join("repo");
    fs::create_dir_all(repo.join("src")).unwrap();
    fs::write(repo.join("Cargo.toml"), "[package]\nname = \"demo\"").unwrap();
    fs::write(repo.join("src/lib.rs"), "pub fn demo() {}").unwrap();

    let repo_arg = repo.to_string_lossy();

    // First check: everything is new; persist it.
    let first = run(&config, &["cache", "check", "acme:demo", &repo_arg, "--save"]);
    assert!(first.status.success(), "{:?}", first);
    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("added: 2"), "{}", stdout);
    assert!(stdout.contains("saved"), "{}", stdout);

    // Second check: nothing changed.
    let second = run(&config, &["cache", "check", "acme:demo", &repo_arg]);
    assert!(second.status.success(), "{:?}", second);
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(stdout.contains("impact: none"), "{}", stdout);
    assert!(stdout.contains("scope: up to date"), "{}", stdout);

    // Manifest change forces a full re-analysis.
    fs::write(repo.join("Cargo.toml"), "[package]\nname = \"demo2\"").unwrap();
    let third = run(&config, &["cache", "check", "acme:demo", &repo_arg]);
    assert!(third.status.success(), "{:?}", third);
    let stdout = String::from_utf8_lossy(&third.stdout);
    assert!(stdout.contains("important resource changed: yes"), "{}", stdout);
    assert!(stdout.contains("scope: full re-analysis"), "{}", stdout);

    let status = run(&config, &["cache", "status", "acme:demo"]);
    assert!(status.status.success(), "{:?}", status);
    let stdout = String::from_utf8_lossy(&status.stdout);
    assert!(stdout.contains("fresh"), "{}", stdout);
}

#[test]
fn similar_finds_the_other_resume() {
    let (tmp, config) = setup_test_env();
    run(&config, &["init"]);

    let alice = tmp.path().join("docs").join("alice.txt");
    let bob = tmp.path().join("docs").join("bob.txt");

    let out = run(&config, &["analyze", &alice.to_string_lossy()]);
    assert!(out.status.success(), "{:?}", out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    let alice_id = stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("document id: "))
        .expect("document id in output")
        .to_string();

    let out = run(&config, &["analyze", &bob.to_string_lossy()]);
    assert!(out.status.success(), "{:?}", out);

    let out = run(&config, &["similar", &alice_id]);
    assert!(out.status.success(), "{:?}", out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(!stdout.contains("No results."), "{}", stdout);
    assert!(!stdout.contains(&alice_id), "self must be excluded: {}", stdout);
}
