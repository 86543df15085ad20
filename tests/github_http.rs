//! HTTP-level tests for the GitHub client.
//!
//! These run against a local wiremock server and verify:
//! - Endpoint paths, request bodies and headers
//! - Mapping of HTTP failures to error classes
//! - Retries for idempotent calls only
//! - A complete publish over HTTP

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use treepush::auth::{Credential, TokenScope};
use treepush::core::input::FileEntry;
use treepush::core::types::{BranchName, Oid};
use treepush::forge::github::GitHubClient;
use treepush::forge::{ForgeError, RepositoryClient, RetryPolicy};
use treepush::publish::{
    ErrorClass, NoProgress, PublishError, PublishJob, PublishOutcome, PublishRequest,
    PublishState, Publisher,
};

const TOKEN: &str = "ghp_wiremock_token_0001";
const REPO: &str = "/repos/octocat/site";

const HEAD: &str = "1111111111111111111111111111111111111111";
const BASE_TREE: &str = "2222222222222222222222222222222222222222";
const BLOB: &str = "3333333333333333333333333333333333333333";
const NEW_TREE: &str = "4444444444444444444444444444444444444444";
const COMMIT: &str = "5555555555555555555555555555555555555555";
const THEIRS: &str = "6666666666666666666666666666666666666666";

fn cred() -> Credential {
    Credential::new(TOKEN, TokenScope::RepoWrite).unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}

fn client(server: &MockServer) -> GitHubClient {
    GitHubClient::new("octocat/site".parse().unwrap())
        .with_api_base(server.uri())
        .with_retry(fast_retry())
}

fn main_branch() -> BranchName {
    BranchName::new("main").unwrap()
}

fn ref_body(sha: &str) -> serde_json::Value {
    json!({
        "ref": "refs/heads/main",
        "node_id": "REF_x",
        "object": { "sha": sha, "type": "commit", "url": "https://example.invalid" }
    })
}

async fn mount_repository(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(REPO))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "full_name": "octocat/site",
            "default_branch": "main",
            "private": false,
            "permissions": { "admin": false, "push": true, "pull": true }
        })))
        .mount(server)
        .await;
}

async fn mount_head(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/git/ref/heads/main")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body(HEAD)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/git/commits/{HEAD}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": HEAD,
            "tree": { "sha": BASE_TREE },
            "parents": [],
            "message": "Initial commit"
        })))
        .mount(server)
        .await;
}

async fn mount_writes(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/git/blobs")))
        .and(body_json(json!({
            "content": BASE64.encode("<h1>hello</h1>\n"),
            "encoding": "base64"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": BLOB })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/git/trees")))
        .and(body_json(json!({
            "base_tree": BASE_TREE,
            "tree": [{ "path": "site/index.html", "mode": "100644", "type": "blob", "sha": BLOB }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": NEW_TREE })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/git/commits")))
        .and(body_json(json!({
            "message": "Publish site",
            "tree": NEW_TREE,
            "parents": [HEAD]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sha": COMMIT,
            "tree": { "sha": NEW_TREE },
            "parents": [{ "sha": HEAD }],
            "message": "Publish site"
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn request() -> PublishRequest {
    PublishRequest {
        branch: main_branch(),
        message: "Publish site".to_string(),
        files: vec![FileEntry::new("site/index.html", "<h1>hello</h1>\n").unwrap()],
    }
}

async fn publish(server: &MockServer) -> (PublishJob, Result<PublishOutcome, PublishError>) {
    let publisher = Publisher::new(Arc::new(client(server)));
    let mut job = PublishJob::new();
    let result = publisher
        .publish(&mut job, &cred(), &request(), &NoProgress, &CancellationToken::new())
        .await;
    (job, result)
}

#[tokio::test]
async fn full_publish_over_http() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    mount_head(&server).await;
    mount_writes(&server).await;
    Mock::given(method("PATCH"))
        .and(path(format!("{REPO}/git/refs/heads/main")))
        .and(body_json(json!({ "sha": COMMIT, "force": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body(COMMIT)))
        .expect(1)
        .mount(&server)
        .await;

    let (job, result) = publish(&server).await;

    let outcome = result.unwrap();
    assert_eq!(outcome.head(), &Oid::new(COMMIT).unwrap());
    assert_eq!(job.state(), PublishState::Success);
    assert_eq!(job.progress(), 100);
}

#[tokio::test]
async fn requests_carry_bearer_token_and_api_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPO))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(header("accept", "application/vnd.github+json"))
        .and(header("x-github-api-version", "2022-11-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "full_name": "octocat/site",
            "default_branch": "trunk"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let repo = client(&server).get_repository(&cred()).await.unwrap();

    assert_eq!(repo.full_name, "octocat/site");
    assert_eq!(repo.default_branch, "trunk");
    assert_eq!(repo.can_push, None);
}

#[tokio::test]
async fn unauthorized_is_authentication_at_validation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPO))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/git/blobs")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": BLOB })))
        .expect(0)
        .mount(&server)
        .await;

    let (job, result) = publish(&server).await;

    let err = result.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Authentication);
    assert!(!err.to_string().contains(TOKEN));
    assert_eq!(job.failed_at(), Some(PublishState::Validating));
}

#[tokio::test]
async fn missing_ref_is_branch_not_found() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/git/ref/heads/main")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let (job, result) = publish(&server).await;

    assert_eq!(
        result.unwrap_err(),
        PublishError::BranchNotFound("main".to_string())
    );
    assert_eq!(job.failed_at(), Some(PublishState::ResolvingRef));
}

#[tokio::test]
async fn missing_repository_is_repository_access() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPO))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let (_, result) = publish(&server).await;

    assert_eq!(result.unwrap_err().class(), ErrorClass::RepositoryAccess);
}

#[tokio::test]
async fn rate_limit_then_success_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/git/ref/heads/main")))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/git/ref/heads/main")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body(HEAD)))
        .mount(&server)
        .await;

    let head = client(&server)
        .get_ref(&cred(), &main_branch())
        .await
        .unwrap();

    assert_eq!(head.sha, Oid::new(HEAD).unwrap());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn exhausted_rate_limit_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPO))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .set_body_json(json!({ "message": "API rate limit exceeded" })),
        )
        .mount(&server)
        .await;

    let err = client(&server).get_repository(&cred()).await.unwrap_err();

    assert!(matches!(err, ForgeError::RateLimited { .. }));
    assert_eq!(PublishError::from(err).class(), ErrorClass::RateLimit);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn long_retry_after_is_not_slept_on() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPO))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3600"))
        .mount(&server)
        .await;

    let err = client(&server).get_repository(&cred()).await.unwrap_err();

    assert!(matches!(
        err,
        ForgeError::RateLimited {
            retry_after: Some(d)
        } if d == Duration::from_secs(3600)
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_on_blobs_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/git/blobs")))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/git/blobs")))
        .and(body_partial_json(json!({ "encoding": "base64" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": BLOB })))
        .mount(&server)
        .await;

    let sha = client(&server).create_blob(&cred(), "data").await.unwrap();

    assert_eq!(sha, Oid::new(BLOB).unwrap());
}

#[tokio::test]
async fn commit_creation_is_sent_once() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    mount_head(&server).await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/git/blobs")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": BLOB })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/git/trees")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": NEW_TREE })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/git/commits")))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{REPO}/git/refs/heads/main")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body(COMMIT)))
        .expect(0)
        .mount(&server)
        .await;

    let (job, result) = publish(&server).await;

    assert_eq!(result.unwrap_err().class(), ErrorClass::Network);
    assert_eq!(job.failed_at(), Some(PublishState::CreatingCommit));
}

#[tokio::test]
async fn rejected_ref_update_is_concurrent_modification() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    // Resolve and the pre-update read see HEAD; the read after the refusal
    // sees someone else's commit.
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/git/ref/heads/main")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body(HEAD)))
        .with_priority(1)
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/git/ref/heads/main")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body(THEIRS)))
        .with_priority(2)
        .mount(&server)
        .await;
    mount_head(&server).await;
    mount_writes(&server).await;
    Mock::given(method("PATCH"))
        .and(path(format!("{REPO}/git/refs/heads/main")))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({ "message": "Update is not a fast forward" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (job, result) = publish(&server).await;

    let err = result.unwrap_err();
    assert_eq!(err.class(), ErrorClass::ConcurrentModification);
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        PublishError::ConcurrentModification { actual: Some(ref sha), .. }
            if sha.as_str() == THEIRS
    ));
    assert_eq!(job.failed_at(), Some(PublishState::UpdatingRef));
}

#[tokio::test]
async fn refused_ref_update_with_unchanged_ref_is_api_error() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    mount_head(&server).await;
    mount_writes(&server).await;
    Mock::given(method("PATCH"))
        .and(path(format!("{REPO}/git/refs/heads/main")))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "message": "Object does not exist" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (job, result) = publish(&server).await;

    let err = result.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Api);
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("Object does not exist"), "{err}");
    assert_eq!(job.failed_at(), Some(PublishState::UpdatingRef));
}
