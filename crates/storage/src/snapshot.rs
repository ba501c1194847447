//! Gallery snapshot file
//!
//! Writes a gallery as a single JSON array of themes and reads it back.
//! Writes go through a temp file and a rename so a reader never sees a
//! half-written snapshot. The previous snapshot can be kept as rotating
//! backups next to the file.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use catalog_core::Gallery;

/// Snapshot error types
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Snapshot configuration
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Path to the snapshot file
    pub path: PathBuf,
    /// Enable atomic writes with temp files
    pub atomic_writes: bool,
    /// Enable automatic backups
    pub auto_backup: bool,
    /// Number of backups to keep
    pub backup_count: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("themes.json"),
            atomic_writes: true,
            auto_backup: false,
            backup_count: 3,
        }
    }
}

impl SnapshotConfig {
    /// Create a new configuration
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Enable or disable atomic writes
    pub fn atomic_writes(mut self, enabled: bool) -> Self {
        self.atomic_writes = enabled;
        self
    }

    /// Configure backups
    pub fn backups(mut self, enabled: bool, count: usize) -> Self {
        self.auto_backup = enabled;
        self.backup_count = count;
        self
    }
}

/// JSON snapshot of a gallery on disk
#[derive(Debug, Clone)]
pub struct GallerySnapshot {
    config: SnapshotConfig,
}

impl GallerySnapshot {
    /// Create a snapshot handle
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    /// Snapshot file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Whether a snapshot has been written
    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.config.path).await.unwrap_or(false)
    }

    /// Write the gallery, replacing any previous snapshot
    pub async fn write(&self, gallery: &Gallery) -> Result<()> {
        let json = gallery.to_json()?;

        if self.config.auto_backup && self.config.backup_count > 0 {
            if let Err(e) = self.create_backup().await {
                tracing::warn!(path = %self.config.path.display(), error = %e, "snapshot backup failed");
            }
        }

        if self.config.atomic_writes {
            self.write_atomic(&json).await?;
        } else {
            fs::write(&self.config.path, json).await?;
        }

        tracing::info!(path = %self.config.path.display(), themes = gallery.len(), "snapshot written");
        Ok(())
    }

    /// Read the snapshot back; invalid records are dropped
    pub async fn read(&self) -> Result<Gallery> {
        let contents = fs::read_to_string(&self.config.path).await?;
        Ok(Gallery::from_json(&contents)?)
    }

    /// Restore a backup over the snapshot and return its contents
    pub async fn restore_from_backup(&self, backup_number: usize) -> Result<Gallery> {
        let backup_path = self.backup_path(backup_number);
        fs::copy(&backup_path, &self.config.path).await?;
        self.read().await
    }

    /// Write atomically using temp file + rename
    async fn write_atomic(&self, contents: &str) -> Result<()> {
        let temp_path = self.config.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.config.path).await?;
        Ok(())
    }

    /// Rotate backups and copy the current snapshot into slot 1
    async fn create_backup(&self) -> Result<()> {
        if !fs::try_exists(&self.config.path).await? {
            return Ok(());
        }

        for i in (1..self.config.backup_count).rev() {
            let from = self.backup_path(i);
            if fs::try_exists(&from).await? {
                fs::rename(&from, self.backup_path(i + 1)).await?;
            }
        }

        fs::copy(&self.config.path, self.backup_path(1)).await?;
        Ok(())
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let filename = self
            .config
            .path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        self.config.path.with_file_name(format!("{filename}.backup.{n}"))
    }
}
