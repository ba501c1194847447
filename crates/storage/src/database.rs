//! Database layer
//!
//! SQLite connection pooling and a small checksummed migration runner. The
//! catalog store builds on the pool exposed here.

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Error as SqlxError, Row, SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Database error types
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error
    #[error("Database error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A batch insert wrote fewer rows than requested and was rolled back
    #[error("Incomplete batch: {inserted} of {expected} rows inserted")]
    IncompleteBatch {
        /// Rows requested
        expected: usize,
        /// Rows actually written
        inserted: u64,
    },

    /// The caller passed a record that cannot be stored
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored value could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl DatabaseError {
    /// Whether the error means "no such row"
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }
}

/// Result type for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path
    pub path: String,
    /// Maximum number of connections in pool
    pub max_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Enable WAL mode
    pub wal_mode: bool,
    /// Synchronous mode
    pub synchronous: SynchronousMode,
}

/// SQLite synchronous mode
#[derive(Debug, Clone, Copy)]
pub enum SynchronousMode {
    /// Off - no synchronization
    Off,
    /// Normal - synchronize at critical moments
    Normal,
    /// Full - synchronize after each write
    Full,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "themes.db".to_string(),
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
            wal_mode: true,
            synchronous: SynchronousMode::Normal,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable WAL mode
    pub fn wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    /// Set synchronous mode
    pub fn synchronous(mut self, mode: SynchronousMode) -> Self {
        self.synchronous = mode;
        self
    }
}

/// SQLite database
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (creating if missing) the database described by `config`
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(DatabaseError::Config("max_connections must be positive".to_string()));
        }

        let mut options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))
            .map_err(|e| DatabaseError::Config(e.to_string()))?
            .create_if_missing(true);

        if config.wal_mode {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        options = match config.synchronous {
            SynchronousMode::Off => options.synchronous(SqliteSynchronous::Off),
            SynchronousMode::Normal => options.synchronous(SqliteSynchronous::Normal),
            SynchronousMode::Full => options.synchronous(SqliteSynchronous::Full),
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %config.path, "database opened");
        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing)
    ///
    /// A single connection that never expires, so the data lives as long as
    /// the pool.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run migrations
    ///
    /// Applied versions are recorded in `_migrations`. A recorded migration
    /// whose checksum no longer matches its definition is an error.
    pub async fn migrate(&self, migrations: &[MigrationDefinition]) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                checksum TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let applied = sqlx::query("SELECT version, checksum FROM _migrations")
            .fetch_all(&self.pool)
            .await?;

        for row in &applied {
            let version: i64 = row.try_get("version")?;
            let checksum: String = row.try_get("checksum")?;
            if let Some(def) = migrations.iter().find(|m| m.version == version) {
                if def.checksum != checksum {
                    return Err(DatabaseError::Migration(format!(
                        "checksum mismatch for migration {version} ({})",
                        def.description
                    )));
                }
            }
        }

        let current_version = self.current_version().await?;

        for migration in migrations {
            if migration.version <= current_version {
                continue;
            }

            tracing::info!(
                version = migration.version,
                description = %migration.description,
                "applying migration"
            );

            let mut tx = self.pool.begin().await?;

            sqlx::query(&migration.sql).execute(&mut *tx).await?;

            sqlx::query("INSERT INTO _migrations (version, description, checksum) VALUES (?, ?, ?)")
                .bind(migration.version)
                .bind(&migration.description)
                .bind(&migration.checksum)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
        }

        Ok(())
    }

    /// Get current migration version
    pub async fn current_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;

        Ok(version.unwrap_or(0))
    }

    /// Check that the database answers queries
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Migration definition
#[derive(Debug, Clone)]
pub struct MigrationDefinition {
    /// Migration version number
    pub version: i64,
    /// Migration description
    pub description: String,
    /// SQL to execute
    pub sql: String,
    /// Checksum for verification
    pub checksum: String,
}

impl MigrationDefinition {
    /// Create a new migration definition
    pub fn new(version: i64, description: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = format!("{:x}", md5::compute(&sql));

        Self {
            version,
            description: description.into(),
            sql,
            checksum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        assert!(db.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("themes.db");

        let db = SqliteDatabase::new(DatabaseConfig::new(path.to_string_lossy()).max_connections(2))
            .await
            .unwrap();
        db.health_check().await.unwrap();
        db.close().await;

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_zero_connections_rejected() {
        let result = SqliteDatabase::new(DatabaseConfig::new("unused.db").max_connections(0)).await;
        assert!(matches!(result, Err(DatabaseError::Config(_))));
    }

    #[tokio::test]
    async fn test_migrations() {
        let db = SqliteDatabase::in_memory().await.unwrap();

        let migrations = vec![
            MigrationDefinition::new(1, "Initial schema", "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"),
            MigrationDefinition::new(2, "Add email column", "ALTER TABLE users ADD COLUMN email TEXT"),
        ];

        db.migrate(&migrations).await.unwrap();
        assert_eq!(db.current_version().await.unwrap(), 2);

        let table: String =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='users'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(table, "users");
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let db = SqliteDatabase::in_memory().await.unwrap();

        let migrations = vec![MigrationDefinition::new(
            1,
            "Initial schema",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
        )];

        db.migrate(&migrations).await.unwrap();
        let version1 = db.current_version().await.unwrap();

        db.migrate(&migrations).await.unwrap();
        let version2 = db.current_version().await.unwrap();

        assert_eq!(version1, version2);
        assert_eq!(version2, 1);
    }

    #[tokio::test]
    async fn test_migration_checksum_mismatch() {
        let db = SqliteDatabase::in_memory().await.unwrap();

        db.migrate(&[MigrationDefinition::new(1, "v1", "CREATE TABLE a (id INTEGER)")])
            .await
            .unwrap();

        let result = db
            .migrate(&[MigrationDefinition::new(1, "v1", "CREATE TABLE a (id TEXT)")])
            .await;
        assert!(matches!(result, Err(DatabaseError::Migration(_))));
    }

    #[tokio::test]
    async fn test_failed_migration_is_not_recorded() {
        let db = SqliteDatabase::in_memory().await.unwrap();

        let result = db
            .migrate(&[MigrationDefinition::new(1, "broken", "CREATE TABLEX nope")])
            .await;

        assert!(result.is_err());
        assert_eq!(db.current_version().await.unwrap(), 0);
    }

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("test.db")
            .max_connections(5)
            .connect_timeout(Duration::from_secs(10))
            .wal_mode(true)
            .synchronous(SynchronousMode::Full);

        assert_eq!(config.path, "test.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.wal_mode);
        assert!(matches!(config.synchronous, SynchronousMode::Full));
        assert_eq!(DatabaseConfig::default().path, "themes.db");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(DatabaseError::NotFound("x".to_string()).is_not_found());
        assert!(!DatabaseError::Config("x".to_string()).is_not_found());
    }
}
