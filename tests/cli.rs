//! End-to-end tests for the `treepush` binary.
//!
//! Every command runs with token variables removed and `TREEPUSH_CONFIG`
//! pointing into a temp directory, so the developer's environment never
//! leaks in.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "ghp_cli_secret_token_0001";

fn treepush(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("treepush").unwrap();
    cmd.current_dir(dir)
        .env_remove("TREEPUSH_TOKEN")
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG")
        .env("TREEPUSH_CONFIG", dir.join("global.toml"))
        .arg("--no-interactive");
    cmd
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("files.json"),
        r#"[{"path": "site/index.html", "content": "<h1>hi</h1>\n"}]"#,
    )
    .unwrap();
    dir
}

#[test]
fn help_lists_commands() {
    let dir = workspace();
    treepush(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn publish_help_explains_tokens() {
    let dir = workspace();
    treepush(dir.path())
        .args(["publish", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("never stored"));
}

#[test]
fn publish_requires_a_source() {
    let dir = workspace();
    treepush(dir.path())
        .args(["publish", "--repo", "octocat/site", "--branch", "main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--manifest"));
}

#[test]
fn publish_without_token_fails_without_prompting() {
    let dir = workspace();
    treepush(dir.path())
        .args(["publish", "--repo", "octocat/site", "--branch", "main"])
        .args(["--manifest", "files.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No token"));
}

#[test]
fn publish_without_target_names_the_flag() {
    let dir = workspace();
    treepush(dir.path())
        .args(["publish", "--manifest", "files.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--repo"));
}

#[test]
fn config_shows_project_values() {
    let dir = workspace();
    std::fs::write(
        dir.path().join(".treepush.toml"),
        "repo = \"octocat/site\"\nbranch = \"gh-pages\"\nprefix = \"docs\"\n",
    )
    .unwrap();

    treepush(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("octocat/site"))
        .stdout(predicate::str::contains("gh-pages"))
        .stdout(predicate::str::contains(".treepush.toml"));
}

#[test]
fn config_rejects_unknown_keys() {
    let dir = workspace();
    std::fs::write(
        dir.path().join(".treepush.toml"),
        format!("repo = \"octocat/site\"\ntoken = \"{SECRET}\"\n"),
    )
    .unwrap();

    treepush(dir.path())
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"))
        .stderr(predicate::str::contains(SECRET).not());
}

async fn github(server: &MockServer, push_status: u16) {
    let repo = "/repos/octocat/site";
    let head = "1".repeat(40);
    let commit = "5".repeat(40);
    Mock::given(method("GET"))
        .and(path(repo))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "full_name": "octocat/site",
            "default_branch": "main",
            "permissions": { "push": true }
        })))
        .mount(server)
        .await;
    // Resolve and the pre-update read see `head`; any later read sees a
    // third-party commit.
    Mock::given(method("GET"))
        .and(path(format!("{repo}/git/ref/heads/main")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": "refs/heads/main",
            "object": { "sha": head, "type": "commit" }
        })))
        .with_priority(1)
        .up_to_n_times(2)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{repo}/git/ref/heads/main")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": "refs/heads/main",
            "object": { "sha": "6".repeat(40), "type": "commit" }
        })))
        .with_priority(2)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{repo}/git/commits/{head}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": head,
            "tree": { "sha": "2".repeat(40) },
            "parents": [],
            "message": "Initial commit"
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{repo}/git/blobs")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": "3".repeat(40) })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{repo}/git/trees")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": "4".repeat(40) })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{repo}/git/commits")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": commit })))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{repo}/git/refs/heads/main")))
        .respond_with(ResponseTemplate::new(push_status).set_body_json(json!({
            "ref": "refs/heads/main",
            "object": { "sha": commit, "type": "commit" },
            "message": "Update is not a fast forward"
        })))
        .mount(server)
        .await;
}

fn point_at(dir: &Path, server: &MockServer) {
    std::fs::write(
        dir.join("global.toml"),
        format!(
            "api_base = \"{}\"\n\n[retry]\nmax_attempts = 1\n",
            server.uri()
        ),
    )
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn publish_json_reports_success() {
    let server = MockServer::start().await;
    github(&server, 200).await;
    let dir = workspace();
    point_at(dir.path(), &server);

    let mut cmd = treepush(dir.path());
    cmd.env("TREEPUSH_TOKEN", SECRET).args([
        "publish",
        "--repo",
        "octocat/site",
        "--branch",
        "main",
        "--manifest",
        "files.json",
        "--json",
    ]);
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["state"], "success");
    assert_eq!(report["progress"], 100);
    assert_eq!(report["outcome"]["kind"], "published");
    assert_eq!(report["outcome"]["commit"], "5".repeat(40));
    let all = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(!all.contains(SECRET));
}

#[tokio::test(flavor = "multi_thread")]
async fn publish_race_fails_with_concurrent_modification() {
    let server = MockServer::start().await;
    github(&server, 422).await;
    let dir = workspace();
    point_at(dir.path(), &server);

    let mut cmd = treepush(dir.path());
    cmd.args([
        "--debug",
        "publish",
        "--token",
        SECRET,
        "--repo",
        "octocat/site",
        "--branch",
        "main",
        "--manifest",
        "files.json",
    ]);
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("concurrent modification"), "{stderr}");
    assert!(!stderr.contains(SECRET), "token leaked into debug output");
}
