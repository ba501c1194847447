//! Gallery pipeline
//!
//! Builds the provider registry, aggregates every provider, persists the
//! merged gallery and optionally downloads the theme files.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use catalog_core::{Aggregator, CancellationToken, Gallery, ProviderRegistry, SourceFailure, Theme};
use networking::{download_to, theme_file_name, HttpTransport};
use providers::{
    ColorSublime, GithubSearchConfig, GithubSearchProvider, MarketplaceConfig, MarketplaceProvider,
    PackageControlConfig, PackageControlProvider, TmThemeEditor,
};
use storage::{CatalogStore, GallerySnapshot};

use crate::config::AppConfig;

const THEME_EXTENSION: &str = ".tmTheme";

/// Register every configured provider
pub fn build_registry(config: &AppConfig, transport: Arc<dyn HttpTransport>) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new()
        .with(Arc::new(TmThemeEditor::new().into_provider(transport.clone())))
        .with(Arc::new(ColorSublime::new().into_provider(transport.clone())))
        .with(Arc::new(PackageControlProvider::new(
            PackageControlConfig::default(),
            transport.clone(),
        )))
        .with(Arc::new(MarketplaceProvider::new(
            MarketplaceConfig::default(),
            transport.clone(),
        )));

    if !config.github_repositories.is_empty() {
        let github = GithubSearchProvider::from_urls(
            &config.github_repositories,
            GithubSearchConfig::default().with_token(config.github_token.clone()),
            transport,
        )
        .context("invalid GitHub repository in configuration")?;
        registry.register(Arc::new(github));
    }

    if !config.providers.is_empty() {
        registry = registry.select(&config.providers);
    }

    tracing::debug!(providers = ?registry.names(), "registry built");
    Ok(registry)
}

/// Outcome of one pipeline run
#[derive(Debug)]
pub struct RunReport {
    /// Saved gallery, identifiers assigned
    pub gallery: Gallery,
    /// Providers that failed
    pub failures: Vec<SourceFailure>,
}

/// Aggregate, store and snapshot the gallery
///
/// Provider failures are reported, not fatal. Storage failures are. Rows
/// from earlier runs are matched on provider and URL, so rerunning does not
/// duplicate the catalog.
pub async fn run(
    registry: &ProviderRegistry,
    store: &dyn CatalogStore,
    snapshot: Option<&GallerySnapshot>,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let (gallery, failures) = Aggregator::run(registry, cancel).await.into_parts();

    for failure in &failures {
        tracing::warn!(provider = %failure.provider, error = %failure.error, "provider failed");
    }
    tracing::info!(themes = gallery.len(), failed = failures.len(), "aggregation finished");

    let themes = persist(store, gallery.into_inner()).await?;

    let mut gallery: Gallery = themes.into_iter().collect();
    gallery.sort_by_name();

    if let Some(snapshot) = snapshot {
        snapshot
            .write(&gallery)
            .await
            .with_context(|| format!("failed to write snapshot {}", snapshot.path().display()))?;
    }

    Ok(RunReport { gallery, failures })
}

/// Save freshly fetched themes
///
/// A theme already stored under the same provider and URL keeps its row and
/// identifier and has its metadata refreshed. Everything else is inserted as
/// one batch.
async fn persist(store: &dyn CatalogStore, themes: Vec<Theme>) -> Result<Vec<Theme>> {
    let mut stored: HashMap<(String, String), Vec<String>> = HashMap::new();
    for theme in store.list(None).await.context("failed to read the catalog")? {
        stored
            .entry((theme.provider.to_string(), theme.url))
            .or_default()
            .push(theme.id);
    }

    let (mut known, mut fresh): (Vec<Theme>, Vec<Theme>) = (Vec::new(), Vec::new());
    for mut theme in themes {
        let id = stored
            .get_mut(&(theme.provider.to_string(), theme.url.clone()))
            .and_then(Vec::pop);
        match id {
            Some(id) => {
                theme.id = id;
                known.push(theme);
            }
            None => fresh.push(theme),
        }
    }

    for theme in &known {
        store
            .update(theme)
            .await
            .with_context(|| format!("failed to refresh {}", theme.name))?;
    }
    store
        .save_batch(&mut fresh)
        .await
        .context("failed to save the gallery")?;

    tracing::info!(refreshed = known.len(), inserted = fresh.len(), "catalog updated");
    known.append(&mut fresh);
    Ok(known)
}

/// Outcome of a download pass
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Downloaded themes, `url` pointing at the local file
    pub local: Gallery,
    /// Themes whose download failed
    pub failed: usize,
    /// Themes without a theme-file URL
    pub skipped: usize,
}

/// Download every theme file of `gallery` into `dir/light` or `dir/dark`
///
/// Individual failures are logged and counted. Stops early on cancellation.
pub async fn download_gallery(
    transport: &dyn HttpTransport,
    gallery: &Gallery,
    dir: &Path,
    cancel: &CancellationToken,
) -> Result<DownloadReport> {
    let mut report = DownloadReport::default();

    for theme in gallery {
        if cancel.is_cancelled() {
            tracing::info!("download cancelled");
            break;
        }

        if !theme.url.ends_with(THEME_EXTENSION) {
            tracing::debug!(theme = %theme.name, url = %theme.url, "not a theme file");
            report.skipped += 1;
            continue;
        }

        let target = theme_path(dir, theme);
        match download_one(transport, theme, &target).await {
            Ok(bytes) => {
                tracing::info!(theme = %theme.name, path = %target.display(), bytes, "theme downloaded");
                let mut local = theme.clone();
                local.url = target.to_string_lossy().into_owned();
                report.local.accept(local);
            }
            Err(e) => {
                tracing::warn!(theme = %theme.name, error = %e, "download failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Local path for a theme file
pub fn theme_path(dir: &Path, theme: &Theme) -> PathBuf {
    let folder = if theme.light { "light" } else { "dark" };
    dir.join(folder)
        .join(format!("{}{THEME_EXTENSION}", theme_file_name(&theme.name)))
}

async fn download_one(transport: &dyn HttpTransport, theme: &Theme, target: &Path) -> Result<u64> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = tokio::fs::File::create(target)
        .await
        .with_context(|| format!("failed to create {}", target.display()))?;

    match download_to(transport, &theme.url, &mut file).await {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            drop(file);
            let _ = tokio::fs::remove_file(target).await;
            Err(e).with_context(|| format!("failed to download {}", theme.url))
        }
    }
}
