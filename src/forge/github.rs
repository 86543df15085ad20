//! forge::github
//!
//! GitHub implementation of [`RepositoryClient`] using the git data REST API.
//!
//! # Design
//!
//! Every publish step maps onto one endpoint under
//! `/repos/{owner}/{repo}`: the repository itself, `git/ref`, `git/commits`,
//! `git/blobs`, `git/trees` and `git/refs`. Blob content is sent base64
//! encoded so arbitrary UTF-8 survives the JSON body unchanged.
//!
//! # Authentication
//!
//! The bearer token arrives with each call and is placed in a header marked
//! sensitive. The client never stores it, and request logging records only
//! the method and path.
//!
//! # Rate Limiting
//!
//! 429 responses, and 403 responses with `x-ratelimit-remaining: 0`, become
//! `ForgeError::RateLimited` carrying the wait from `Retry-After` or
//! `x-ratelimit-reset`. Idempotent calls are retried by the configured
//! [`RetryPolicy`]; commit creation and ref updates are sent exactly once.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::retry::RetryPolicy;
use super::traits::{
    CommitInfo, ForgeError, GitRef, NewCommit, Repository, RepositoryClient, TreeEntry,
};
use crate::auth::Credential;
use crate::core::types::{BranchName, Oid, RepoId};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "treepush";

/// GitHub client bound to one repository.
///
/// Holds no credential: every call receives one from the caller.
pub struct GitHubClient {
    /// HTTP client for making requests
    client: Client,
    /// Target repository
    repo: RepoId,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
    /// Backoff for idempotent requests
    retry: RetryPolicy,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .field("retry", &self.retry)
            .finish()
    }
}

impl GitHubClient {
    /// Create a client for `repo` on github.com with the default retry policy.
    pub fn new(repo: RepoId) -> Self {
        Self {
            client: Client::new(),
            repo,
            api_base: DEFAULT_API_BASE.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Use a custom API base URL (e.g. `https://github.example.com/api/v3`).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a custom retry policy for idempotent requests.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The configured API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build common headers for API requests.
    fn headers(&self, cred: &Credential) -> Result<HeaderMap, ForgeError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", cred.expose()))
            .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint. An empty path addresses the
    /// repository itself.
    fn repo_url(&self, path: &str) -> String {
        let base = format!(
            "{}/repos/{}/{}",
            self.api_base,
            self.repo.owner(),
            self.repo.name()
        );
        if path.is_empty() {
            base
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Issue one request and decode the response.
    async fn send<T, B>(
        &self,
        cred: &Credential,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<T, ForgeError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        debug!(%method, url, "github request");
        let mut request = self
            .client
            .request(method, url)
            .headers(self.headers(cred)?);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        self.handle_response(response).await
    }

    /// Issue an idempotent request under the retry policy.
    async fn send_idempotent<T, B>(
        &self,
        what: &str,
        cred: &Credential,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<T, ForgeError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        self.retry
            .run(what, move || self.send(cred, method.clone(), url, body))
            .await
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ForgeError::InvalidResponse(format!("failed to parse response: {}", e)))
        } else {
            Err(Self::error_from_response(response, status).await)
        }
    }

    /// Map an error response to a `ForgeError`.
    async fn error_from_response(response: Response, status: StatusCode) -> ForgeError {
        // Headers must be read before the body consumes the response.
        let headers = response.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        };
        let required_scopes = header("X-Accepted-OAuth-Scopes");
        let granted_scopes = header("X-OAuth-Scopes");
        let rate_exhausted = header("x-ratelimit-remaining").as_deref() == Some("0");
        let retry_after = retry_after(
            header("retry-after").as_deref(),
            header("x-ratelimit-reset").as_deref(),
            chrono::Utc::now().timestamp(),
        );

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited { retry_after },
            StatusCode::FORBIDDEN
                if rate_exhausted || message.to_ascii_lowercase().contains("rate limit") =>
            {
                ForgeError::RateLimited { retry_after }
            }
            StatusCode::FORBIDDEN => {
                let mut err_msg = format!("Permission denied: {}", message);
                if let Some(scopes) = required_scopes.filter(|s| !s.is_empty()) {
                    err_msg.push_str(&format!(" [required scopes: {}]", scopes));
                    if let Some(granted) = granted_scopes {
                        err_msg.push_str(&format!(" [granted: {}]", granted));
                    }
                }
                ForgeError::AuthFailed(err_msg)
            }
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

/// Work out how long the host wants us to wait.
///
/// `Retry-After` (seconds) wins over `x-ratelimit-reset` (epoch seconds).
fn retry_after(retry_after: Option<&str>, reset: Option<&str>, now: i64) -> Option<Duration> {
    if let Some(secs) = retry_after.and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }
    let reset = reset.and_then(|v| v.parse::<i64>().ok())?;
    Some(Duration::from_secs(reset.saturating_sub(now).max(0) as u64))
}

/// Escape the characters a branch name may legally contain that would
/// otherwise change the meaning of a URL path.
fn encode_ref_path(branch: &BranchName) -> String {
    branch
        .as_str()
        .replace('%', "%25")
        .replace('#', "%23")
        .replace('&', "%26")
}

fn parse_oid(sha: String) -> Result<Oid, ForgeError> {
    Oid::new(sha).map_err(|e| ForgeError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl RepositoryClient for GitHubClient {
    fn name(&self) -> &'static str {
        "github"
    }

    fn repo(&self) -> &RepoId {
        &self.repo
    }

    async fn get_repository(&self, cred: &Credential) -> Result<Repository, ForgeError> {
        let url = self.repo_url("");
        let repo: GitHubRepository = self
            .send_idempotent("get repository", cred, Method::GET, &url, None::<&()>)
            .await?;
        Ok(Repository {
            full_name: repo.full_name,
            default_branch: repo.default_branch,
            can_push: repo.permissions.map(|p| p.push),
        })
    }

    async fn get_ref(
        &self,
        cred: &Credential,
        branch: &BranchName,
    ) -> Result<GitRef, ForgeError> {
        let url = self.repo_url(&format!("git/ref/heads/{}", encode_ref_path(branch)));
        let reference: GitHubRef = self
            .send_idempotent("get ref", cred, Method::GET, &url, None::<&()>)
            .await?;
        reference.into_git_ref(branch)
    }

    async fn get_commit(&self, cred: &Credential, sha: &Oid) -> Result<CommitInfo, ForgeError> {
        let url = self.repo_url(&format!("git/commits/{}", sha));
        let commit: GitHubCommit = self
            .send_idempotent("get commit", cred, Method::GET, &url, None::<&()>)
            .await?;
        Ok(CommitInfo {
            sha: parse_oid(commit.sha)?,
            tree: parse_oid(commit.tree.sha)?,
            parents: commit
                .parents
                .into_iter()
                .map(|p| parse_oid(p.sha))
                .collect::<Result<_, _>>()?,
            message: commit.message,
        })
    }

    async fn create_blob(&self, cred: &Credential, content: &str) -> Result<Oid, ForgeError> {
        let url = self.repo_url("git/blobs");
        let body = CreateBlobBody {
            content: BASE64.encode(content.as_bytes()),
            encoding: "base64",
        };
        let created: GitHubSha = self
            .send_idempotent("create blob", cred, Method::POST, &url, Some(&body))
            .await?;
        parse_oid(created.sha)
    }

    async fn create_tree(
        &self,
        cred: &Credential,
        base_tree: &Oid,
        entries: &[TreeEntry],
    ) -> Result<Oid, ForgeError> {
        let url = self.repo_url("git/trees");
        let body = CreateTreeBody {
            base_tree: base_tree.as_str(),
            tree: entries
                .iter()
                .map(|entry| CreateTreeEntry {
                    path: entry.path.as_str(),
                    mode: TreeEntry::MODE,
                    kind: TreeEntry::KIND,
                    sha: entry.sha.as_str(),
                })
                .collect(),
        };
        let created: GitHubSha = self
            .send_idempotent("create tree", cred, Method::POST, &url, Some(&body))
            .await?;
        parse_oid(created.sha)
    }

    async fn create_commit(
        &self,
        cred: &Credential,
        commit: &NewCommit,
    ) -> Result<Oid, ForgeError> {
        let url = self.repo_url("git/commits");
        let body = CreateCommitBody {
            message: &commit.message,
            tree: commit.tree.as_str(),
            parents: [commit.parent.as_str()],
        };
        let created: GitHubSha = self.send(cred, Method::POST, &url, Some(&body)).await?;
        parse_oid(created.sha)
    }

    async fn update_ref(
        &self,
        cred: &Credential,
        branch: &BranchName,
        sha: &Oid,
    ) -> Result<GitRef, ForgeError> {
        let url = self.repo_url(&format!("git/refs/heads/{}", encode_ref_path(branch)));
        let body = UpdateRefBody {
            sha: sha.as_str(),
            force: false,
        };
        let reference: GitHubRef = self.send(cred, Method::PATCH, &url, Some(&body)).await?;
        reference.into_git_ref(branch)
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// Request body for creating a blob.
#[derive(Serialize)]
struct CreateBlobBody {
    content: String,
    encoding: &'static str,
}

/// Request body for creating a tree.
#[derive(Serialize)]
struct CreateTreeBody<'a> {
    base_tree: &'a str,
    tree: Vec<CreateTreeEntry<'a>>,
}

/// One entry in a tree creation request.
#[derive(Serialize)]
struct CreateTreeEntry<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    sha: &'a str,
}

/// Request body for creating a commit.
#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    tree: &'a str,
    parents: [&'a str; 1],
}

/// Request body for moving a ref.
#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// GitHub repository response (subset).
#[derive(Deserialize)]
struct GitHubRepository {
    full_name: String,
    default_branch: String,
    permissions: Option<GitHubPermissions>,
}

/// Permissions of the authenticated user on a repository.
#[derive(Deserialize)]
struct GitHubPermissions {
    push: bool,
}

/// GitHub ref response.
#[derive(Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: String,
    object: GitHubRefObject,
}

/// Object a ref points to.
#[derive(Deserialize)]
struct GitHubRefObject {
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GitHubRef {
    fn into_git_ref(self, branch: &BranchName) -> Result<GitRef, ForgeError> {
        let expected = format!("refs/heads/{}", branch);
        if self.ref_name != expected {
            return Err(ForgeError::InvalidResponse(format!(
                "expected ref '{}', got '{}'",
                expected, self.ref_name
            )));
        }
        if self.object.kind != "commit" {
            return Err(ForgeError::InvalidResponse(format!(
                "ref '{}' points to a {}, not a commit",
                self.ref_name, self.object.kind
            )));
        }
        Ok(GitRef {
            branch: branch.clone(),
            sha: parse_oid(self.object.sha)?,
        })
    }
}

/// GitHub git commit response (subset).
#[derive(Deserialize)]
struct GitHubCommit {
    sha: String,
    tree: GitHubSha,
    parents: Vec<GitHubSha>,
    message: String,
}

/// Any response that carries just the object id we care about.
#[derive(Deserialize)]
struct GitHubSha {
    sha: String,
}

// --------------------------------------------------------------------------
// URL Parsing
// --------------------------------------------------------------------------

/// Parse a GitHub remote URL to extract owner and repo.
///
/// Supports both SSH and HTTPS formats:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo.git`
/// - `https://github.com/owner/repo`
///
/// # Example
///
/// ```
/// use treepush::forge::github::parse_github_url;
///
/// let (owner, repo) = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenScope;

    fn client() -> GitHubClient {
        GitHubClient::new("octocat/hello-world".parse().unwrap())
    }

    mod parse_github_url {
        use super::*;

        #[test]
        fn ssh_and_https_forms() {
            let expected = Some(("octocat".to_string(), "hello-world".to_string()));
            assert_eq!(parse_github_url("git@github.com:octocat/hello-world.git"), expected);
            assert_eq!(parse_github_url("git@github.com:octocat/hello-world"), expected);
            assert_eq!(parse_github_url("https://github.com/octocat/hello-world.git"), expected);
            assert_eq!(parse_github_url("https://github.com/octocat/hello-world"), expected);
            assert_eq!(parse_github_url("http://github.com/octocat/hello-world.git"), expected);
        }

        #[test]
        fn non_github_url() {
            assert!(parse_github_url("git@gitlab.com:owner/repo.git").is_none());
            assert!(parse_github_url("https://bitbucket.org/owner/repo").is_none());
        }

        #[test]
        fn invalid_format() {
            assert!(parse_github_url("not a url").is_none());
            assert!(parse_github_url("github.com/owner/repo").is_none());
            assert!(parse_github_url("https://github.com/").is_none());
            assert!(parse_github_url("https://github.com/owner").is_none());
            assert!(parse_github_url("https://github.com/owner/").is_none());
        }

        #[test]
        fn repo_with_dots() {
            assert_eq!(
                parse_github_url("git@github.com:owner/repo.name.git"),
                Some(("owner".to_string(), "repo.name".to_string()))
            );
        }
    }

    #[test]
    fn repo_url_format() {
        let client = client();
        assert_eq!(
            client.repo_url(""),
            "https://api.github.com/repos/octocat/hello-world"
        );
        assert_eq!(
            client.repo_url("git/blobs"),
            "https://api.github.com/repos/octocat/hello-world/git/blobs"
        );
    }

    #[test]
    fn api_base_trailing_slash_trimmed() {
        let client = client().with_api_base("https://github.example.com/api/v3/");
        assert_eq!(client.api_base(), "https://github.example.com/api/v3");
        assert_eq!(
            client.repo_url("git/trees"),
            "https://github.example.com/api/v3/repos/octocat/hello-world/git/trees"
        );
    }

    #[test]
    fn headers_mark_token_sensitive() {
        let cred = Credential::new("ghp_secret_token_abc", TokenScope::RepoWrite).unwrap();
        let headers = client().headers(&cred).unwrap();
        let auth = headers.get(AUTHORIZATION).unwrap();
        assert!(auth.is_sensitive());
        assert_eq!(headers.get(USER_AGENT).unwrap(), "treepush");
        assert!(!format!("{:?}", auth).contains("ghp_secret_token_abc"));
    }

    #[test]
    fn debug_has_no_secrets() {
        let debug = format!("{:?}", client());
        assert!(debug.contains("hello-world"));
        assert!(!debug.contains("Bearer"));
    }

    #[test]
    fn encode_ref_path_escapes_url_syntax() {
        let branch = BranchName::new("feature/100%#1&2").unwrap();
        assert_eq!(encode_ref_path(&branch), "feature/100%25%231%262");
        let plain = BranchName::new("release/v1").unwrap();
        assert_eq!(encode_ref_path(&plain), "release/v1");
    }

    #[test]
    fn retry_after_prefers_header_seconds() {
        assert_eq!(
            retry_after(Some("12"), Some("999999"), 0),
            Some(Duration::from_secs(12))
        );
        assert_eq!(
            retry_after(None, Some("1060"), 1000),
            Some(Duration::from_secs(60))
        );
        assert_eq!(retry_after(None, Some("900"), 1000), Some(Duration::ZERO));
        assert_eq!(retry_after(None, None, 1000), None);
        assert_eq!(retry_after(Some("soon"), None, 1000), None);
    }

    #[test]
    fn ref_response_must_point_at_commit() {
        let branch = BranchName::new("main").unwrap();
        let tag = GitHubRef {
            ref_name: "refs/heads/main".into(),
            object: GitHubRefObject {
                sha: "a".repeat(40),
                kind: "tag".into(),
            },
        };
        assert!(matches!(
            tag.into_git_ref(&branch),
            Err(ForgeError::InvalidResponse(_))
        ));

        let other = GitHubRef {
            ref_name: "refs/heads/mainline".into(),
            object: GitHubRefObject {
                sha: "a".repeat(40),
                kind: "commit".into(),
            },
        };
        assert!(other.into_git_ref(&branch).is_err());
    }

    #[test]
    fn commit_body_has_single_parent() {
        let body = CreateCommitBody {
            message: "publish",
            tree: "t",
            parents: ["p"],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["parents"], serde_json::json!(["p"]));
    }

    #[test]
    fn tree_entry_serializes_type_field() {
        let entry = CreateTreeEntry {
            path: "a.txt",
            mode: TreeEntry::MODE,
            kind: TreeEntry::KIND,
            sha: "abc",
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"path": "a.txt", "mode": "100644", "type": "blob", "sha": "abc"})
        );
    }
}
