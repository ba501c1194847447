use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use catalog_core::CancellationToken;
use networking::{HttpTransport, ReqwestTransport, RetryPolicy, RetryingTransport, TransportConfig};
use storage::{DatabaseConfig, GallerySnapshot, SnapshotConfig, SqliteDatabase, ThemeStore};
use theme_gallery::{build_registry, download_gallery, run, AppConfig};

const LOCAL_GALLERY_FILE: &str = "themes_meta.json";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    tracing::info!(database = %config.database_path, snapshot = %config.snapshot_path.display(), "starting");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("shutdown requested, keeping what was fetched so far");
                cancel.cancel();
            }
        }
    });

    let transport: Arc<dyn HttpTransport> = Arc::new(RetryingTransport::new(
        ReqwestTransport::new(TransportConfig::default()).context("failed to build HTTP client")?,
        RetryPolicy::default(),
    ));

    let db = SqliteDatabase::new(DatabaseConfig::new(&config.database_path))
        .await
        .with_context(|| format!("failed to open database {}", config.database_path))?;
    let store = ThemeStore::new(db);
    store.migrate().await.context("failed to migrate database")?;

    let registry = build_registry(&config, transport.clone())?;
    let snapshot = GallerySnapshot::new(SnapshotConfig::new(&config.snapshot_path).backups(true, 3));

    let report = run(&registry, &store, Some(&snapshot), &cancel).await?;
    let stored = store.count().await.context("failed to count themes")?;
    tracing::info!(
        themes = report.gallery.len(),
        failed_providers = report.failures.len(),
        stored,
        "gallery updated"
    );

    if let Some(dir) = &config.download_dir {
        let downloads = download_gallery(transport.as_ref(), &report.gallery, dir, &cancel).await?;
        tracing::info!(
            downloaded = downloads.local.len(),
            failed = downloads.failed,
            skipped = downloads.skipped,
            "downloads finished"
        );

        GallerySnapshot::new(SnapshotConfig::new(dir.join(LOCAL_GALLERY_FILE)))
            .write(&downloads.local)
            .await
            .context("failed to write local gallery")?;
    }

    store.database().close().await;
    Ok(())
}
