//! Repository identity
//!
//! Resolves the GitHub project that owns a theme from any of the URL forms
//! upstream sources hand out (`github.com`, `raw.githubusercontent.com`,
//! `api.github.com/repos/...`). Branch and license are resolved lazily through
//! [`GithubApi`] and cached on the [`ProjectRepository`] afterwards.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use networking::{HttpRequest, HttpTransport, TransportError};

use crate::hash::repository_hash;

/// Branch assumed when the default branch cannot be resolved
pub const FALLBACK_BRANCH: &str = "master";

const GITHUB_HOSTS: &[&str] = &["github.com", "www.github.com", "raw.githubusercontent.com", "api.github.com"];

/// Repository identity errors
#[derive(Debug, Error)]
pub enum RepoError {
    /// The URL does not point at a GitHub domain
    #[error("not a GitHub URL: {0}")]
    NotAGithubUrl(String),

    /// The URL is unparseable or lacks owner/name segments
    #[error("malformed repository URL: {0}")]
    MalformedUrl(String),

    /// The API returned no default branch
    #[error("default branch not found for {0}")]
    DefaultBranchNotFound(String),

    /// The API refused the request due to rate limiting
    #[error("GitHub API rate limit exceeded")]
    RateLimitExceeded,

    /// Transport failure talking to the API
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RepoError {
    /// Whether retrying later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RepoError::RateLimitExceeded => true,
            RepoError::Transport(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

/// Identity of a GitHub project
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectRepository {
    /// Owning user or organization
    pub owner: String,
    /// Repository name
    pub name: String,
    /// Default branch, once resolved
    pub branch: Option<String>,
    /// License name, once resolved
    pub license: Option<String>,
}

impl ProjectRepository {
    /// Create a repository identity
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            branch: None,
            license: None,
        }
    }

    /// Set a known branch
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Parse a repository from any supported GitHub URL
    pub fn resolve(source_url: &str) -> Result<Self> {
        let url = Url::parse(source_url).map_err(|_| RepoError::MalformedUrl(source_url.to_string()))?;

        let host = url
            .host_str()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| RepoError::MalformedUrl(source_url.to_string()))?;
        if !GITHUB_HOSTS.contains(&host.as_str()) {
            return Err(RepoError::NotAGithubUrl(source_url.to_string()));
        }

        let mut segments = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default();

        if host == "api.github.com" && segments.first() == Some(&"repos") {
            segments.remove(0);
        }

        match segments.as_slice() {
            [owner, name, ..] => {
                let name = name.strip_suffix(".git").unwrap_or(*name);
                if name.is_empty() {
                    return Err(RepoError::MalformedUrl(source_url.to_string()));
                }
                Ok(Self::new(*owner, name))
            }
            _ => Err(RepoError::MalformedUrl(source_url.to_string())),
        }
    }

    /// Canonical `https://github.com/<owner>/<name>` URL
    pub fn canonical_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }

    /// Deterministic hash of the canonical URL
    pub fn hash(&self) -> String {
        repository_hash(&self.canonical_url())
    }

    /// Resolved branch, or the fallback
    pub fn branch_or_default(&self) -> &str {
        self.branch.as_deref().unwrap_or(FALLBACK_BRANCH)
    }

    /// README URL for the current branch knowledge
    pub fn readme_url(&self) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/{}/README.md",
            self.owner,
            self.name,
            self.branch_or_default()
        )
    }

    /// Resolve the default branch and license with one API call
    ///
    /// Does nothing when the branch is already known. A license that is
    /// already set is kept.
    pub async fn load_branch_and_license(&mut self, api: &GithubApi) -> Result<()> {
        if self.branch.is_some() {
            return Ok(());
        }

        let info = api.repository_info(&self.owner, &self.name).await?;
        if self.license.is_none() {
            self.license = info.license;
        }
        self.branch = Some(info.default_branch);
        Ok(())
    }

    /// Best-effort README URL
    ///
    /// Tries to resolve the branch first; a failure is logged and the
    /// fallback branch is used instead.
    pub async fn infer_readme_url(&mut self, api: &GithubApi) -> String {
        if let Err(e) = self.load_branch_and_license(api).await {
            tracing::debug!(repo = %self, error = %e, "branch resolution failed, guessing README location");
        }
        self.readme_url()
    }
}

impl fmt::Display for ProjectRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parse a repository from a source URL
pub fn resolve_repo(source_url: &str) -> Result<ProjectRepository> {
    ProjectRepository::resolve(source_url)
}

// =============================================================================
// GitHub API
// =============================================================================

/// Repository metadata returned by the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    /// Default branch
    pub default_branch: String,
    /// License name
    pub license: Option<String>,
}

#[derive(Deserialize)]
struct RepoResponse {
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    license: Option<LicenseResponse>,
}

#[derive(Deserialize)]
struct LicenseResponse {
    #[serde(default)]
    name: String,
}

/// Minimal GitHub REST client for repository metadata
#[derive(Clone)]
pub struct GithubApi {
    transport: Arc<dyn HttpTransport>,
    api_base: String,
    token: Option<String>,
}

impl GithubApi {
    /// Public API base URL
    pub const DEFAULT_BASE: &'static str = "https://api.github.com";

    /// Create a client against the public API
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            api_base: Self::DEFAULT_BASE.to_string(),
            token: None,
        }
    }

    /// Use a different API base (tests, GitHub Enterprise)
    pub fn with_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Authenticate requests with a token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// API base URL
    pub fn base(&self) -> &str {
        &self.api_base
    }

    /// Attach the standard headers to a request
    pub fn authorize(&self, request: HttpRequest) -> HttpRequest {
        let request = request.header("Accept", "application/vnd.github.v3+json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {token}")),
            None => request,
        }
    }

    /// The underlying transport
    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    /// Fetch default branch and license of `owner/name`
    pub async fn repository_info(&self, owner: &str, name: &str) -> Result<RepositoryInfo> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner, name);
        let response = self.transport.send(self.authorize(HttpRequest::get(&url))).await?;

        let full_name = format!("{owner}/{name}");
        match response.status {
            200 => {}
            403 | 429 => return Err(RepoError::RateLimitExceeded),
            status => {
                tracing::debug!(repo = %full_name, status, "repository lookup failed");
                return Err(RepoError::DefaultBranchNotFound(full_name));
            }
        }

        let body: RepoResponse = response
            .json()
            .map_err(|_| RepoError::DefaultBranchNotFound(full_name.clone()))?;

        if body.default_branch.is_empty() {
            return Err(RepoError::DefaultBranchNotFound(full_name));
        }

        Ok(RepositoryInfo {
            default_branch: body.default_branch,
            license: body.license.map(|l| l.name).filter(|n| !n.is_empty()),
        })
    }
}
