//! forge::github
//!
//! GitHub object store using the REST git data and Pages APIs.
//!
//! # Endpoints
//!
//! | Operation        | Request                                      |
//! |------------------|----------------------------------------------|
//! | `default_branch` | `GET /repos/{o}/{r}`                         |
//! | `read_ref`       | `GET /repos/{o}/{r}/git/ref/heads/{b}`       |
//! | `read_commit`    | `GET /repos/{o}/{r}/git/commits/{sha}`       |
//! | `read_file`      | `GET /repos/{o}/{r}/contents/{path}?ref=`    |
//! | `create_blob`    | `POST /repos/{o}/{r}/git/blobs`              |
//! | `create_tree`    | `POST /repos/{o}/{r}/git/trees`              |
//! | `create_commit`  | `POST /repos/{o}/{r}/git/commits`            |
//! | `update_ref`     | `PATCH /repos/{o}/{r}/git/refs/heads/{b}`    |
//! | `latest_build`   | `GET /repos/{o}/{r}/pages/builds/latest`     |
//!
//! # Compare-and-swap
//!
//! Branch updates are sent with `force: false`. GitHub accepts them only
//! as fast-forwards, so a commit whose parent is the expected head is
//! rejected once the branch has moved. That rejection (422, or 409) maps
//! to [`StoreError::Conflict`].
//!
//! # Authentication
//!
//! Tokens come from a [`TokenProvider`] on every request. 401/403
//! responses trigger one retry with a fresh token.
//!
//! # Rate Limiting
//!
//! Returns `StoreError::RateLimited` when limits are hit. Retrying is the
//! caller's responsibility.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::traits::{
    BuildInfo, BuildStatus, BuildStatusSource, CommitInfo, FileContent, NewCommit, ObjectStore,
    StoreError, TreeItem,
};
use crate::auth::TokenProvider;
use crate::core::config::DEFAULT_API_BASE;
use crate::core::types::{BranchName, ContentPath, Oid, RepoRef};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = concat!("logshelf/", env!("CARGO_PKG_VERSION"));

/// GitHub REST object store.
pub struct GitHubStore {
    client: Client,
    token_provider: Arc<dyn TokenProvider>,
    api_base: String,
}

// Custom Debug to avoid exposing the token provider
impl std::fmt::Debug for GitHubStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubStore")
            .field("host", &self.token_provider.host())
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubStore {
    /// Create a store against `https://api.github.com`.
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self::with_api_base(provider, DEFAULT_API_BASE)
    }

    /// Create a store against a custom API base URL.
    ///
    /// Use this for GitHub Enterprise (`https://github.example.com/api/v3`)
    /// or a local test server.
    pub fn with_api_base(provider: Arc<dyn TokenProvider>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token_provider: provider,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// The API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Login of the authenticated user.
    pub async fn current_user(&self) -> Result<String, StoreError> {
        let url = self.endpoint(&["user"])?;
        let user: UserResponse = self.request(Method::GET, url, None).await?;
        Ok(user.login)
    }

    /// Build common headers for API requests.
    async fn headers(&self) -> Result<HeaderMap, StoreError> {
        let token = self
            .token_provider
            .bearer_token()
            .await
            .map_err(|e| match e {
                crate::auth::AuthError::NotAuthenticated(_) => StoreError::AuthRequired,
                other => StoreError::AuthFailed(other.to_string()),
            })?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| StoreError::AuthFailed("token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
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

    /// Check if an error is an auth failure that might be resolved by token refresh.
    fn is_retryable_auth_error(err: &StoreError) -> bool {
        matches!(err, StoreError::AuthFailed(_))
    }

    /// Build an endpoint URL from path segments, percent-encoding each.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::NetworkError(format!("invalid API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::NetworkError("API base cannot hold a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Build a repository endpoint URL.
    fn repo_endpoint(&self, repo: &RepoRef, segments: &[&str]) -> Result<Url, StoreError> {
        let mut all = vec!["repos", repo.owner.as_str(), repo.name.as_str()];
        all.extend_from_slice(segments);
        self.endpoint(&all)
    }

    /// Send a request, retrying once on auth failure.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<T, StoreError> {
        let result = self.execute(method.clone(), url.clone(), body).await;
        match result {
            Err(ref e) if Self::is_retryable_auth_error(e) => {
                tracing::debug!(url = %url.path(), "auth failure, retrying once");
                self.execute(method, url, body).await
            }
            other => other,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<T, StoreError> {
        tracing::debug!(method = %method, url = %url.path(), "github request");
        let mut request = self
            .client
            .request(method, url)
            .headers(self.headers().await?);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;
        self.handle_response(response).await
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, StoreError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| StoreError::Decode(format!("failed to parse response: {}", e)))
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, StoreError> {
        let required_permissions = response
            .headers()
            .get("X-Accepted-GitHub-Permissions")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let rate_limit_exhausted = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "0");

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => StoreError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN if rate_limit_exhausted => StoreError::RateLimited,
            StatusCode::FORBIDDEN => {
                let mut err_msg = format!("Permission denied: {}", message);
                if let Some(perms) = required_permissions.filter(|p| !p.is_empty()) {
                    err_msg.push_str(&format!(" [required: {}]", perms));
                }
                StoreError::AuthFailed(err_msg)
            }
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited,
            _ if status.is_server_error() => StoreError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => StoreError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Fetch a blob by id. Used for files too large for the contents API.
    async fn read_blob(&self, repo: &RepoRef, sha: &Oid) -> Result<Vec<u8>, StoreError> {
        let url = self.repo_endpoint(repo, &["git", "blobs", sha.as_str()])?;
        let blob: BlobResponse = self.request(Method::GET, url, None).await?;
        decode_content(&blob.content, &blob.encoding)
    }
}

/// Parse an object id from a response field.
fn parse_oid(value: &str) -> Result<Oid, StoreError> {
    Oid::new(value).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Whether a ref update was refused because the branch moved.
///
/// GitHub also answers 422 for missing objects and refs; those are not
/// conflicts.
fn is_fast_forward_rejection(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("fast forward") || message.contains("fast-forward")
}

/// Decode a contents or blob payload.
fn decode_content(content: &str, encoding: &str) -> Result<Vec<u8>, StoreError> {
    match encoding {
        "base64" => {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            BASE64
                .decode(compact)
                .map_err(|e| StoreError::Decode(format!("invalid base64 content: {e}")))
        }
        "utf-8" | "utf8" => Ok(content.as_bytes().to_vec()),
        other => Err(StoreError::Decode(format!("unsupported encoding '{other}'"))),
    }
}

#[async_trait]
impl ObjectStore for GitHubStore {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn default_branch(&self, repo: &RepoRef) -> Result<BranchName, StoreError> {
        let url = self.repo_endpoint(repo, &[])?;
        let info: RepoResponse = self.request(Method::GET, url, None).await?;
        BranchName::new(info.default_branch).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn read_ref(&self, repo: &RepoRef, branch: &BranchName) -> Result<Oid, StoreError> {
        let mut segments = vec!["git", "ref", "heads"];
        segments.extend(branch.as_str().split('/'));
        let url = self.repo_endpoint(repo, &segments)?;
        let reference: RefResponse = self.request(Method::GET, url, None).await?;
        parse_oid(&reference.object.sha)
    }

    async fn read_commit(&self, repo: &RepoRef, sha: &Oid) -> Result<CommitInfo, StoreError> {
        let url = self.repo_endpoint(repo, &["git", "commits", sha.as_str()])?;
        let commit: CommitResponse = self.request(Method::GET, url, None).await?;
        Ok(CommitInfo {
            sha: parse_oid(&commit.sha)?,
            tree: parse_oid(&commit.tree.sha)?,
            parents: commit
                .parents
                .iter()
                .map(|p| parse_oid(&p.sha))
                .collect::<Result<_, _>>()?,
        })
    }

    async fn read_file(
        &self,
        repo: &RepoRef,
        path: &ContentPath,
        at: &Oid,
    ) -> Result<Option<FileContent>, StoreError> {
        let mut segments = vec!["contents"];
        segments.extend(path.as_str().split('/'));
        let mut url = self.repo_endpoint(repo, &segments)?;
        url.query_pairs_mut().append_pair("ref", at.as_str());

        let value: serde_json::Value = match self.request(Method::GET, url, None).await {
            Ok(value) => value,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        // Directories come back as arrays
        if value.is_array() {
            return Ok(None);
        }
        let file: ContentResponse =
            serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))?;
        if file.kind != "file" {
            return Ok(None);
        }

        let sha = parse_oid(&file.sha)?;
        let content = match (file.content.as_deref(), file.encoding.as_deref()) {
            (Some(content), Some("base64")) if !content.is_empty() => {
                decode_content(content, "base64")?
            }
            _ => self.read_blob(repo, &sha).await?,
        };
        Ok(Some(FileContent { sha, content }))
    }

    async fn create_blob(&self, repo: &RepoRef, content: &[u8]) -> Result<Oid, StoreError> {
        let url = self.repo_endpoint(repo, &["git", "blobs"])?;
        let body = serde_json::json!({
            "content": BASE64.encode(content),
            "encoding": "base64",
        });
        let created: ShaResponse = self.request(Method::POST, url, Some(&body)).await?;
        parse_oid(&created.sha)
    }

    async fn create_tree(
        &self,
        repo: &RepoRef,
        base_tree: &Oid,
        items: &[TreeItem],
    ) -> Result<Oid, StoreError> {
        let url = self.repo_endpoint(repo, &["git", "trees"])?;
        let body = serde_json::to_value(CreateTreeBody {
            base_tree: base_tree.as_str(),
            tree: items,
        })
        .map_err(|e| StoreError::Decode(e.to_string()))?;
        let created: ShaResponse = self.request(Method::POST, url, Some(&body)).await?;
        parse_oid(&created.sha)
    }

    async fn create_commit(&self, repo: &RepoRef, commit: NewCommit) -> Result<Oid, StoreError> {
        let url = self.repo_endpoint(repo, &["git", "commits"])?;
        let mut body = serde_json::json!({
            "message": commit.message,
            "tree": commit.tree.as_str(),
            "parents": commit.parents.iter().map(Oid::as_str).collect::<Vec<_>>(),
        });
        if let Some(author) = &commit.author {
            body["author"] = serde_json::json!({ "name": author.name, "email": author.email });
        }
        let created: ShaResponse = self.request(Method::POST, url, Some(&body)).await?;
        parse_oid(&created.sha)
    }

    async fn update_ref(
        &self,
        repo: &RepoRef,
        branch: &BranchName,
        expected: &Oid,
        new: &Oid,
    ) -> Result<(), StoreError> {
        let mut segments = vec!["git", "refs", "heads"];
        segments.extend(branch.as_str().split('/'));
        let url = self.repo_endpoint(repo, &segments)?;
        let body = serde_json::json!({ "sha": new.as_str(), "force": false });

        tracing::debug!(branch = %branch, expected = %expected.short(7), new = %new.short(7), "update ref");
        let result: Result<serde_json::Value, StoreError> =
            self.request(Method::PATCH, url, Some(&body)).await;
        match result {
            Ok(_) => Ok(()),
            Err(StoreError::ApiError { status, message })
                if (status == 422 || status == 409) && is_fast_forward_rejection(&message) =>
            {
                Err(StoreError::Conflict {
                    branch: branch.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BuildStatusSource for GitHubStore {
    async fn latest_build(&self, repo: &RepoRef) -> Result<BuildInfo, StoreError> {
        let url = self.repo_endpoint(repo, &["pages", "builds", "latest"])?;
        let build: PagesBuildResponse = self.request(Method::GET, url, None).await?;
        Ok(BuildInfo {
            status: BuildStatus::parse(&build.status),
            commit: build.commit,
        })
    }
}

// =============================================================================
// GitHub API types (internal)
// =============================================================================

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: ShaResponse,
}

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    tree: ShaResponse,
    #[serde(default)]
    parents: Vec<ShaResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    content: Option<String>,
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct PagesBuildResponse {
    status: String,
    commit: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateTreeBody<'a> {
    base_tree: &'a str,
    tree: &'a [TreeItem],
}
