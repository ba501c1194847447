//! Package Control label search
//!
//! Two phases:
//!
//! 1. One request per configured label collects candidate package names.
//!    Names are not deduplicated unless [`PackageControlConfig::dedup_candidates`]
//!    is set, so a package listed under two labels is fetched twice.
//! 2. One request per candidate fetches the package details. A package that
//!    answers 404 becomes a tombstone and is filtered out of the gallery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use catalog_core::{
    fan_out, resolve_repo, CancellationToken, FanOut, FetchFailure, FetchResult, Gallery, Provider, ProviderError,
    ProviderName, Theme,
};
use networking::{HttpRequest, HttpTransport, RateGate};

use crate::serde_util::{lenient_timestamp, nullable};

/// Provider name
pub const NAME: &str = "Package Control";

/// Public registry
pub const DEFAULT_BASE_URL: &str = "https://packagecontrol.io";

/// Labels that carry color schemes
pub const DEFAULT_LABELS: &[&str] = &["theme", "color scheme", "monokai"];

/// 25 requests per second
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(40);

/// Package Control provider configuration
#[derive(Debug, Clone)]
pub struct PackageControlConfig {
    /// Registry base URL
    pub base_url: String,
    /// Labels to search
    pub labels: Vec<String>,
    /// Interval between request starts
    pub request_interval: Duration,
    /// Fetch each candidate package only once
    pub dedup_candidates: bool,
}

impl Default for PackageControlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            request_interval: DEFAULT_REQUEST_INTERVAL,
            dedup_candidates: false,
        }
    }
}

impl PackageControlConfig {
    /// Create a configuration with the given labels
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the registry base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request interval
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    /// Fetch each candidate only once
    pub fn dedup_candidates(mut self, dedup: bool) -> Self {
        self.dedup_candidates = dedup;
        self
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct LabelListing {
    #[serde(default, deserialize_with = "nullable")]
    packages: Vec<LabelPackage>,
}

#[derive(Debug, Deserialize)]
struct LabelPackage {
    #[serde(default, deserialize_with = "nullable")]
    name: String,
}

/// Package detail document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDetails {
    /// Package name
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Description
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    /// Homepage URL
    #[serde(default, deserialize_with = "nullable")]
    pub homepage: String,
    /// Authors
    #[serde(default, deserialize_with = "nullable")]
    pub authors: Vec<String>,
    /// Labels
    #[serde(default, deserialize_with = "nullable")]
    pub labels: Vec<String>,
    /// Supported Sublime Text major versions
    #[serde(default, deserialize_with = "nullable")]
    pub st_versions: Vec<i64>,
    /// Last modification
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_modified: Option<DateTime<Utc>>,
    /// The registry no longer serves this package
    #[serde(default, deserialize_with = "nullable")]
    pub is_missing: bool,
    /// Why the package is missing
    #[serde(default, deserialize_with = "nullable")]
    pub missing_error: String,
    /// Source repository URLs
    #[serde(default, deserialize_with = "nullable")]
    pub sources: Vec<String>,
    /// README URL
    #[serde(default, deserialize_with = "nullable")]
    pub readme: String,
    /// Removed from the registry
    #[serde(default, deserialize_with = "nullable")]
    pub removed: bool,
}

impl PackageDetails {
    /// Placeholder for a package that no longer exists
    pub fn tombstone(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_missing: true,
            removed: true,
            ..Default::default()
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Package Control provider
pub struct PackageControlProvider {
    config: PackageControlConfig,
    transport: Arc<dyn HttpTransport>,
    gate: RateGate,
}

impl PackageControlProvider {
    /// Create a provider
    pub fn new(config: PackageControlConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let gate = RateGate::new(config.request_interval);
        Self {
            config,
            transport,
            gate,
        }
    }

    /// Change the interval between requests
    pub fn set_request_interval(&self, interval: Duration) {
        self.gate.set_period(interval);
    }

    /// Provider configuration
    pub fn config(&self) -> &PackageControlConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url =
            Url::parse(&self.config.base_url).map_err(|e| ProviderError::Endpoint(format!("{}: {e}", self.config.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Endpoint(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `<base>/browse/labels/<label>.json`
    pub fn label_url(&self, label: &str) -> Result<Url, ProviderError> {
        self.endpoint(&["browse", "labels", format!("{label}.json").as_str()])
    }

    /// `<base>/packages/<name>.json`
    pub fn package_url(&self, name: &str) -> Result<Url, ProviderError> {
        self.endpoint(&["packages", format!("{name}.json").as_str()])
    }

    /// Collect candidate package names from every label
    ///
    /// Duplicates across labels are kept.
    pub async fn fetch_candidate_names(&self, cancel: &CancellationToken) -> FanOut<String> {
        fan_out(self.config.labels.iter().cloned(), &self.gate, cancel, |label| {
            let transport = Arc::clone(&self.transport);
            let url = self.label_url(&label);
            async move {
                let url = url?;
                tracing::info!(provider = NAME, label = %label, "fetching label");

                let response = transport.send(HttpRequest::get(url.as_str())).await?;
                if response.status != 200 {
                    return Err(ProviderError::SourceUnavailable {
                        url: url.to_string(),
                        status: response.status,
                    });
                }

                let listing: LabelListing = response.json().map_err(|e| ProviderError::Decode(e.to_string()))?;
                Ok(listing
                    .packages
                    .into_iter()
                    .map(|p| p.name)
                    .filter(|n| !n.is_empty())
                    .collect())
            }
        })
        .await
    }

    /// Fetch details for every candidate
    ///
    /// Missing packages come back as tombstones. A transport failure on a
    /// single package is logged and that package skipped.
    pub async fn fetch_packages(&self, names: Vec<String>, cancel: &CancellationToken) -> FanOut<PackageDetails> {
        fan_out(names, &self.gate, cancel, |name| {
            let transport = Arc::clone(&self.transport);
            let url = self.package_url(&name);
            async move { fetch_package(transport.as_ref(), url?, name).await }
        })
        .await
    }

    /// Normalize package details into a theme
    pub fn to_theme(&self, package: PackageDetails) -> Theme {
        let mut repository = None;
        let mut fallback_source = None;
        for source in &package.sources {
            match resolve_repo(source) {
                Ok(repo) => {
                    repository = Some(repo);
                    break;
                }
                Err(_) => fallback_source = Some(source.clone()),
            }
        }

        let url = match (&repository, package.homepage.is_empty()) {
            (Some(repo), _) => repo.canonical_url(),
            (None, false) => package.homepage.clone(),
            (None, true) => self
                .package_url(&package.name)
                .map(|u| u.to_string().trim_end_matches(".json").to_string())
                .unwrap_or_default(),
        };

        let version = package.st_versions.last().map(|v| v.to_string()).unwrap_or_default();

        let theme = Theme::new(package.name, url, NAME)
            .with_description(package.description)
            .with_author(package.authors.join(", "))
            .with_readme(package.readme)
            .with_version(version)
            .with_last_update(package.last_modified);

        match (repository, fallback_source) {
            (Some(repo), _) => theme.with_project_repository(&repo),
            (None, Some(source)) => theme.with_project_url(source),
            (None, None) => theme,
        }
    }
}

async fn fetch_package(
    transport: &dyn HttpTransport,
    url: Url,
    name: String,
) -> Result<Vec<PackageDetails>, ProviderError> {
    let response = match transport.send(HttpRequest::get(url.as_str())).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(provider = NAME, package = %name, error = %e, "package request failed, skipping");
            return Ok(Vec::new());
        }
    };

    match response.status {
        200 => {}
        404 => {
            tracing::debug!(provider = NAME, package = %name, "package no longer exists");
            return Ok(vec![PackageDetails::tombstone(name)]);
        }
        status => {
            return Err(ProviderError::SourceUnavailable {
                url: url.to_string(),
                status,
            })
        }
    }

    if !response.is_json() {
        return Err(ProviderError::Decode(format!("non-JSON response for package {name}")));
    }

    let mut details: PackageDetails = response.json().map_err(|e| ProviderError::Decode(e.to_string()))?;
    if details.name.is_empty() {
        details.name = name;
    }
    Ok(vec![details])
}

#[async_trait]
impl Provider for PackageControlProvider {
    fn name(&self) -> ProviderName {
        ProviderName::from(NAME)
    }

    async fn get_gallery(&self, cancel: &CancellationToken) -> FetchResult {
        let candidates = self.fetch_candidate_names(cancel).await;
        let label_error = candidates.error;
        let mut names = candidates.items;

        if let Some(ProviderError::Cancelled) = label_error {
            return Err(ProviderError::Cancelled.into());
        }

        if self.config.dedup_candidates {
            let mut seen = HashSet::new();
            names.retain(|n| seen.insert(n.clone()));
        }
        tracing::info!(provider = NAME, candidates = names.len(), "candidate packages collected");

        let packages = self.fetch_packages(names, cancel).await;
        let tombstones = packages.items.iter().filter(|p| p.is_missing).count();

        let gallery: Gallery = packages
            .items
            .into_iter()
            .filter(|p| !p.is_missing)
            .map(|p| self.to_theme(p))
            .collect();
        tracing::info!(provider = NAME, themes = gallery.len(), tombstones, "packages fetched");

        match label_error.or(packages.error) {
            Some(error) => Err(FetchFailure::new(error, gallery)),
            None if gallery.is_empty() => Err(ProviderError::NoThemesFound.into()),
            None => Ok(gallery),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use networking::HttpResponse;

    struct NoTransport;

    #[async_trait]
    impl HttpTransport for NoTransport {
        async fn send(&self, request: HttpRequest) -> networking::Result<HttpResponse> {
            Ok(HttpResponse::new(500, request.url, ""))
        }
    }

    fn provider() -> PackageControlProvider {
        PackageControlProvider::new(PackageControlConfig::default(), Arc::new(NoTransport))
    }

    #[test]
    fn test_endpoints() {
        let p = provider();
        assert_eq!(
            p.label_url("theme").unwrap().as_str(),
            "https://packagecontrol.io/browse/labels/theme.json"
        );
        assert_eq!(
            p.label_url("color scheme").unwrap().as_str(),
            "https://packagecontrol.io/browse/labels/color%20scheme.json"
        );
        assert_eq!(
            p.package_url("Theme - Soda").unwrap().as_str(),
            "https://packagecontrol.io/packages/Theme%20-%20Soda.json"
        );
    }

    #[test]
    fn test_bad_base_url() {
        let p = PackageControlProvider::new(
            PackageControlConfig::default().with_base_url("not a url"),
            Arc::new(NoTransport),
        );
        assert!(matches!(p.label_url("theme"), Err(ProviderError::Endpoint(_))));
    }

    #[test]
    fn test_package_mapping() {
        let package: PackageDetails = serde_json::from_str(
            r#"{
                "name": "Monokai Extended",
                "description": "Extends Monokai",
                "homepage": "https://example.com/monokai",
                "authors": ["jonschlinkert", "bobby"],
                "st_versions": [2, 3],
                "last_modified": "2020-01-02 03:04:05",
                "sources": ["https://bitbucket.org/x/y", "https://github.com/jonschlinkert/sublime-monokai-extended"],
                "readme": "https://raw.githubusercontent.com/jonschlinkert/sublime-monokai-extended/master/README.md",
                "is_missing": false
            }"#,
        )
        .unwrap();

        let theme = provider().to_theme(package);

        assert_eq!(theme.name, "Monokai Extended");
        assert_eq!(theme.author, "jonschlinkert, bobby");
        assert_eq!(theme.version.as_deref(), Some("3"));
        assert_eq!(theme.project_repo, "https://github.com/jonschlinkert/sublime-monokai-extended");
        assert_eq!(theme.url, theme.project_repo);
        assert!(theme.last_update.is_some());
        assert_eq!(theme.provider.as_str(), NAME);
    }

    #[test]
    fn test_package_without_github_source() {
        let package: PackageDetails = serde_json::from_str(
            r#"{"name":"Odd","homepage":null,"authors":null,"sources":["https://gitlab.com/a/odd"],"readme":null}"#,
        )
        .unwrap();

        let theme = provider().to_theme(package);

        assert_eq!(theme.project_repo, "https://gitlab.com/a/odd");
        assert!(!theme.project_repo_id.is_empty());
        assert_eq!(theme.url, "https://packagecontrol.io/packages/Odd");
        assert!(theme.version.is_none());
    }

    #[test]
    fn test_tombstone() {
        let tombstone = PackageDetails::tombstone("Gone");
        assert!(tombstone.is_missing);
        assert!(tombstone.removed);
        assert_eq!(tombstone.name, "Gone");
    }
}
