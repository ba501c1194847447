//! Visual Studio Marketplace theme extensions
//!
//! The gallery `extensionquery` endpoint is paged: page 1 reports the total
//! count in its result metadata, the remaining pages are fetched
//! concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::{
    fetch_all_pages, resolve_repo, CancellationToken, FetchFailure, FetchResult, Gallery, Page, PageSource, Provider,
    ProviderError, ProviderName, Theme,
};
use networking::{HttpRequest, HttpTransport, RateGate};

use crate::serde_util::{lenient_timestamp, nullable};

/// Provider name
pub const NAME: &str = "Visual Studio Marketplace";

/// Public gallery query endpoint
pub const DEFAULT_ENDPOINT: &str = "https://marketplace.visualstudio.com/_apis/public/gallery/extensionquery";

/// Extensions per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// 5 requests per second
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(200);

const ACCEPT: &str = "application/json;api-version=6.1-preview.1;excludeUrls=true";

const PROP_SOURCE: &str = "Microsoft.VisualStudio.Services.Links.Source";
const PROP_LEARN: &str = "Microsoft.VisualStudio.Services.Links.Learn";
const PROP_BRANDING_THEME: &str = "Microsoft.VisualStudio.Services.Branding.Theme";
const ASSET_VSIX: &str = "Microsoft.VisualStudio.Services.VSIXPackage";

/// Marketplace provider configuration
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    /// Query endpoint
    pub endpoint: String,
    /// Extensions per page
    pub page_size: u32,
    /// Interval between request starts
    pub request_interval: Duration,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_interval: DEFAULT_REQUEST_INTERVAL,
        }
    }
}

impl MarketplaceConfig {
    /// Set the query endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
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
struct QueryResponse {
    #[serde(default, deserialize_with = "nullable")]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default, deserialize_with = "nullable")]
    extensions: Vec<Extension>,
    #[serde(default, deserialize_with = "nullable")]
    result_metadata: Vec<ResultMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultMetadata {
    #[serde(default, deserialize_with = "nullable")]
    metadata_items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
struct MetadataItem {
    #[serde(default, deserialize_with = "nullable")]
    name: String,
    #[serde(default)]
    count: u64,
}

/// One extension from the query response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    /// Publisher
    #[serde(default, deserialize_with = "nullable")]
    pub publisher: Publisher,
    /// Extension identifier
    #[serde(default, deserialize_with = "nullable")]
    pub extension_id: String,
    /// Short name
    #[serde(default, deserialize_with = "nullable")]
    pub extension_name: String,
    /// Display name
    #[serde(default, deserialize_with = "nullable")]
    pub display_name: String,
    /// Short description
    #[serde(default, deserialize_with = "nullable")]
    pub short_description: String,
    /// Versions, newest first
    #[serde(default, deserialize_with = "nullable")]
    pub versions: Vec<ExtensionVersion>,
}

/// Extension publisher
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publisher {
    /// Publisher short name
    #[serde(default, deserialize_with = "nullable")]
    pub publisher_name: String,
    /// Publisher display name
    #[serde(default, deserialize_with = "nullable")]
    pub display_name: String,
}

/// One published version
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionVersion {
    /// Version string
    #[serde(default, deserialize_with = "nullable")]
    pub version: String,
    /// Publication time
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Asset files
    #[serde(default, deserialize_with = "nullable")]
    pub files: Vec<AssetFile>,
    /// Key/value properties
    #[serde(default, deserialize_with = "nullable")]
    pub properties: Vec<Property>,
}

impl ExtensionVersion {
    /// Look up a property value
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Source URL of an asset type
    pub fn asset(&self, asset_type: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.asset_type == asset_type)
            .map(|f| f.source.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Asset file reference
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFile {
    /// Asset type identifier
    #[serde(default, deserialize_with = "nullable")]
    pub asset_type: String,
    /// Download URL
    #[serde(default, deserialize_with = "nullable")]
    pub source: String,
}

/// Version property
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Property {
    /// Property key
    #[serde(default, deserialize_with = "nullable")]
    pub key: String,
    /// Property value
    #[serde(default, deserialize_with = "nullable")]
    pub value: String,
}

/// Normalize an extension; extensions without versions are skipped
pub fn extension_to_theme(extension: Extension) -> Option<Theme> {
    let Some(version) = extension.versions.first() else {
        tracing::debug!(provider = NAME, extension = %extension.extension_name, "extension has no versions");
        return None;
    };

    let publisher = &extension.publisher.publisher_name;
    let url = version.asset(ASSET_VSIX).map(str::to_string).unwrap_or_else(|| {
        format!(
            "https://marketplace.visualstudio.com/_apis/public/gallery/publishers/{}/vsextensions/{}/{}/vspackage",
            publisher, extension.extension_name, version.version
        )
    });

    let light = version
        .property(PROP_BRANDING_THEME)
        .map(|b| b.eq_ignore_ascii_case("light"))
        .unwrap_or(false);

    let mut theme = Theme::new(extension.display_name.clone(), url, NAME)
        .with_author(publisher.clone())
        .with_description(extension.short_description.clone())
        .with_version(version.version.clone())
        .with_light(light)
        .with_last_update(version.last_updated)
        .with_readme(version.property(PROP_LEARN).unwrap_or_default());

    if let Some(source) = version.property(PROP_SOURCE) {
        theme = match resolve_repo(source) {
            Ok(repo) => theme.with_project_repository(&repo),
            Err(_) => theme.with_project_url(source),
        };
    }

    Some(theme)
}

// =============================================================================
// Paging
// =============================================================================

struct ExtensionPages {
    endpoint: String,
    page_size: u32,
    transport: Arc<dyn HttpTransport>,
}

impl ExtensionPages {
    fn query_body(&self, page: u32) -> serde_json::Value {
        json!({
            "assetTypes": [
                "Microsoft.VisualStudio.Services.Icons.Default",
                "Microsoft.VisualStudio.Services.Icons.Branding",
                "Microsoft.VisualStudio.Services.Icons.Small"
            ],
            "filters": [{
                "criteria": [
                    { "filterType": 8, "value": "Microsoft.VisualStudio.Code" },
                    { "filterType": 10, "value": "target:\"Microsoft.VisualStudio.Code\" " },
                    { "filterType": 12, "value": "37888" },
                    { "filterType": 5, "value": "Themes" }
                ],
                "direction": 2,
                "pageSize": self.page_size,
                "pageNumber": page,
                "sortBy": 4,
                "sortOrder": 0,
                "pagingToken": null
            }],
            "flags": 870
        })
    }
}

#[async_trait]
impl PageSource for ExtensionPages {
    type Item = Theme;

    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn fetch_page(&self, page: u32) -> Result<Page<Theme>, ProviderError> {
        let request = HttpRequest::post(&self.endpoint)
            .header("Accept", ACCEPT)
            .json_body(&self.query_body(page))?;

        let response = self.transport.send(request).await?;
        if response.status != 200 {
            tracing::warn!(provider = NAME, page, status = response.status, "extension query failed");
            return Err(ProviderError::SourceUnavailable {
                url: self.endpoint.clone(),
                status: response.status,
            });
        }

        let body: QueryResponse = serde_json::from_slice(&response.body)?;
        let result = body.results.into_iter().next().ok_or(ProviderError::MissingTotal)?;

        let total = result
            .result_metadata
            .first()
            .and_then(|meta| meta.metadata_items.iter().find(|item| item.name == "TotalCount"))
            .map(|item| item.count)
            .ok_or(ProviderError::MissingTotal)?;

        let themes = result.extensions.into_iter().filter_map(extension_to_theme).collect();
        Ok(Page::new(total, themes))
    }
}

/// Visual Studio Marketplace provider
pub struct MarketplaceProvider {
    pages: Arc<ExtensionPages>,
    gate: RateGate,
}

impl MarketplaceProvider {
    /// Create a provider
    pub fn new(config: MarketplaceConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            pages: Arc::new(ExtensionPages {
                endpoint: config.endpoint,
                page_size: config.page_size.max(1),
                transport,
            }),
            gate: RateGate::new(config.request_interval),
        }
    }

    /// Change the interval between requests
    pub fn set_request_interval(&self, interval: Duration) {
        self.gate.set_period(interval);
    }
}

#[async_trait]
impl Provider for MarketplaceProvider {
    fn name(&self) -> ProviderName {
        ProviderName::from(NAME)
    }

    async fn get_gallery(&self, cancel: &CancellationToken) -> FetchResult {
        let fetched = fetch_all_pages(Arc::clone(&self.pages), &self.gate, cancel).await;
        let gallery: Gallery = fetched.items.into_iter().collect();
        tracing::info!(provider = NAME, themes = gallery.len(), "extensions fetched");

        match fetched.error {
            Some(error) => Err(FetchFailure::new(error, gallery)),
            None if gallery.is_empty() => {
                tracing::warn!(provider = NAME, "no extension mapped to a theme");
                Err(ProviderError::NoThemesFound.into())
            }
            None => Ok(gallery),
        }
    }
}
