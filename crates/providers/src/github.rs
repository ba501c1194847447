//! GitHub code search
//!
//! Finds `.tmTheme` files inside configured repositories through the code
//! search API. Each repository is searched page by page; download URLs
//! point at the raw content host on the repository's default branch, which
//! is resolved once per repository and cached.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::Instrument;

use catalog_core::fetch::admit;
use catalog_core::{
    fetch_all_pages, CancellationToken, FetchFailure, FetchResult, Gallery, GithubApi, Page, PageSource,
    ProjectRepository, Provider, ProviderError, ProviderName, RepoError, Theme,
};
use networking::{HttpRequest, HttpTransport, RateGate};

use crate::serde_util::nullable;

/// Provider name
pub const NAME: &str = "Github";

/// Raw content host
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Results per search page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Ten requests per minute, the unauthenticated code search budget
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_secs(6);

/// Repository searched when none is configured
pub const DEFAULT_REPOSITORY: &str = "https://github.com/filmgirl/TextMate-Themes";

const THEME_EXTENSION: &str = "tmTheme";

/// GitHub code search configuration
#[derive(Debug, Clone)]
pub struct GithubSearchConfig {
    /// REST API base
    pub api_base: String,
    /// Raw content base
    pub raw_base: String,
    /// Personal access token
    pub token: Option<String>,
    /// Results per page
    pub page_size: u32,
    /// Interval between request starts
    pub request_interval: Duration,
}

impl Default for GithubSearchConfig {
    fn default() -> Self {
        Self {
            api_base: GithubApi::DEFAULT_BASE.to_string(),
            raw_base: DEFAULT_RAW_BASE.to_string(),
            token: None,
            page_size: DEFAULT_PAGE_SIZE,
            request_interval: DEFAULT_REQUEST_INTERVAL,
        }
    }
}

impl GithubSearchConfig {
    /// Set the API base
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the raw content base
    pub fn with_raw_base(mut self, raw_base: impl Into<String>) -> Self {
        self.raw_base = raw_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the access token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the page size
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the request interval
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default, deserialize_with = "nullable")]
    name: String,
    #[serde(default, deserialize_with = "nullable")]
    path: String,
}

// =============================================================================
// Paging
// =============================================================================

/// Code search over one repository whose branch is already settled
struct CodeSearch {
    api: GithubApi,
    raw_base: String,
    page_size: u32,
    repo: ProjectRepository,
}

impl CodeSearch {
    fn to_theme(&self, item: SearchItem) -> Theme {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_base,
            self.repo.owner,
            self.repo.name,
            self.repo.branch_or_default(),
            item.path
        );
        let name = item
            .name
            .strip_suffix(&format!(".{THEME_EXTENSION}"))
            .unwrap_or(item.name.as_str())
            .to_string();

        Theme::new(name, url, NAME)
            .with_author(self.repo.owner.clone())
            .with_project_repository(&self.repo)
            .with_readme(self.repo.readme_url())
    }
}

#[async_trait]
impl PageSource for CodeSearch {
    type Item = Theme;

    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn fetch_page(&self, page: u32) -> Result<Page<Theme>, ProviderError> {
        let url = format!("{}/search/code", self.api.base());
        let request = self.api.authorize(
            HttpRequest::get(&url)
                .query(
                    "q",
                    format!("repo:{}/{} extension:{THEME_EXTENSION}", self.repo.owner, self.repo.name),
                )
                .query("page", page.to_string())
                .query("per_page", self.page_size.to_string()),
        );

        let response = self.api.transport().send(request).await?;
        if response.status != 200 {
            tracing::warn!(provider = NAME, repo = %self.repo, page, status = response.status, "code search failed");
            return Err(ProviderError::SourceUnavailable {
                url,
                status: response.status,
            });
        }

        let body: SearchResponse = serde_json::from_slice(&response.body)?;
        let themes = body.items.into_iter().map(|item| self.to_theme(item)).collect();
        Ok(Page::new(body.total_count, themes))
    }
}

// =============================================================================
// Provider
// =============================================================================

/// GitHub code search provider
pub struct GithubSearchProvider {
    api: GithubApi,
    config: GithubSearchConfig,
    repositories: Vec<Mutex<ProjectRepository>>,
    gate: RateGate,
}

impl GithubSearchProvider {
    /// Create a provider over the given repositories
    pub fn new(
        repositories: impl IntoIterator<Item = ProjectRepository>,
        config: GithubSearchConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let api = GithubApi::new(transport)
            .with_base(config.api_base.clone())
            .with_token(config.token.clone());
        let gate = RateGate::new(config.request_interval);

        Self {
            api,
            repositories: repositories.into_iter().map(Mutex::new).collect(),
            config,
            gate,
        }
    }

    /// Create a provider from repository URLs
    pub fn from_urls<S: AsRef<str>>(
        urls: &[S],
        config: GithubSearchConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, RepoError> {
        let repositories = urls
            .iter()
            .map(|u| ProjectRepository::resolve(u.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(repositories, config, transport))
    }

    /// Change the interval between requests
    pub fn set_request_interval(&self, interval: Duration) {
        self.gate.set_period(interval);
    }

    /// Repositories searched by this provider
    pub async fn repositories(&self) -> Vec<ProjectRepository> {
        let mut out = Vec::with_capacity(self.repositories.len());
        for repo in &self.repositories {
            out.push(repo.lock().await.clone());
        }
        out
    }

    /// Resolve the branch once, falling back to the default on any failure
    ///
    /// The lookup is paced by the provider's gate. `None` when cancelled.
    async fn settle_branch(
        &self,
        slot: &Mutex<ProjectRepository>,
        cancel: &CancellationToken,
    ) -> Option<ProjectRepository> {
        let mut repo = slot.lock().await;
        if repo.branch.is_none() {
            if !admit(&self.gate, cancel).await {
                return None;
            }

            let lookup = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                lookup = repo.load_branch_and_license(&self.api) => lookup,
            };
            if let Err(e) = lookup {
                let full_name = repo.to_string();
                tracing::warn!(provider = NAME, repo = %full_name, error = %e, "branch lookup failed, using fallback");
            }
        }
        Some(repo.clone())
    }
}

#[async_trait]
impl Provider for GithubSearchProvider {
    fn name(&self) -> ProviderName {
        ProviderName::from(NAME)
    }

    async fn get_gallery(&self, cancel: &CancellationToken) -> FetchResult {
        let mut gallery = Gallery::new();
        let mut first_error = None;

        for slot in &self.repositories {
            if cancel.is_cancelled() {
                first_error = Some(ProviderError::Cancelled);
                break;
            }

            let Some(repo) = self.settle_branch(slot, cancel).await else {
                first_error = Some(ProviderError::Cancelled);
                break;
            };
            let span = tracing::info_span!("code_search", repo = %repo);

            let search = Arc::new(CodeSearch {
                api: self.api.clone(),
                raw_base: self.config.raw_base.clone(),
                page_size: self.config.page_size.max(1),
                repo,
            });

            let fetched = fetch_all_pages(search, &self.gate, cancel).instrument(span).await;
            tracing::info!(provider = NAME, files = fetched.items.len(), "repository searched");
            gallery.extend(fetched.items);

            match fetched.error {
                None => {}
                Some(ProviderError::NoThemesFound) => {
                    tracing::info!(provider = NAME, "repository has no theme files");
                }
                Some(ProviderError::Cancelled) => {
                    first_error = Some(ProviderError::Cancelled);
                    break;
                }
                Some(error) => {
                    tracing::warn!(provider = NAME, error = %error, "repository search failed");
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(FetchFailure::new(error, gallery)),
            None if gallery.is_empty() => Err(ProviderError::NoThemesFound.into()),
            None => Ok(gallery),
        }
    }
}
