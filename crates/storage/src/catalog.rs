//! Theme catalog store
//!
//! Transactional CRUD over the `themes` table. Identifiers are assigned here
//! and nowhere else. Batch saves are all or nothing: either every record is
//! written and keeps its new identifier, or the transaction is rolled back
//! and every identifier assigned by the call is cleared again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use catalog_core::{Gallery, ListFilter, ProviderName, Theme};

use crate::database::{DatabaseError, Result, SqliteDatabase};
use crate::migrations::theme_migrations;

/// Rows per INSERT statement; 14 columns each stays under SQLite's 999 bound parameters
const BATCH_CHUNK: usize = 64;

const COLUMNS: &str = "id, name, author, description, url, hash, light, version, \
                       project_repo_id, project_repo, readme, license, provider, updated_at";

/// Persistence contract for theme records
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Assign a fresh identifier and insert one record
    async fn save_one(&self, theme: &mut Theme) -> Result<()>;

    /// Assign identifiers and insert every record in one transaction
    async fn save_batch(&self, themes: &mut [Theme]) -> Result<()>;

    /// Fetch a record by identifier
    async fn get(&self, id: &str) -> Result<Theme>;

    /// Overwrite the mutable fields of an existing record
    async fn update(&self, theme: &Theme) -> Result<()>;

    /// Remove a record; removing an absent record is an error
    async fn delete(&self, id: &str) -> Result<()>;

    /// List records ordered by name, optionally windowed
    async fn list(&self, filter: Option<ListFilter>) -> Result<Gallery>;
}

/// SQLite-backed theme store
#[derive(Debug, Clone)]
pub struct ThemeStore {
    db: SqliteDatabase,
}

impl ThemeStore {
    /// Wrap an open database
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db }
    }

    /// Apply the theme schema migrations
    pub async fn migrate(&self) -> Result<()> {
        self.db.migrate(&theme_migrations()).await
    }

    /// Underlying database
    pub fn database(&self) -> &SqliteDatabase {
        &self.db
    }

    /// Number of stored themes
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM themes")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Every theme sharing a project repository hash, ordered by name
    pub async fn list_by_repository(&self, repo_hash: &str) -> Result<Gallery> {
        if repo_hash.is_empty() {
            return Ok(Gallery::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM themes WHERE project_repo_id = ? ORDER BY name, id"
        ))
        .bind(repo_hash)
        .fetch_all(self.db.pool())
        .await?;

        collect_gallery(&rows)
    }

    async fn insert_batch(&self, themes: &[Theme]) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0u64;

        for chunk in themes.chunks(BATCH_CHUNK) {
            // OR IGNORE lets constraint failures surface as a short count
            let mut builder: QueryBuilder<'_, Sqlite> =
                QueryBuilder::new(format!("INSERT OR IGNORE INTO themes ({COLUMNS}) "));
            builder.push_values(chunk, |mut row, theme| {
                row.push_bind(theme.id.clone())
                    .push_bind(theme.name.clone())
                    .push_bind(theme.author.clone())
                    .push_bind(theme.description.clone())
                    .push_bind(theme.url.clone())
                    .push_bind(theme.hash.clone())
                    .push_bind(theme.light)
                    .push_bind(theme.version.clone())
                    .push_bind(theme.project_repo_id.clone())
                    .push_bind(theme.project_repo.clone())
                    .push_bind(theme.readme.clone())
                    .push_bind(theme.license.clone())
                    .push_bind(theme.provider.to_string())
                    .push_bind(encode_timestamp(theme.last_update));
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        if inserted != themes.len() as u64 {
            tx.rollback().await?;
            return Err(DatabaseError::IncompleteBatch {
                expected: themes.len(),
                inserted,
            });
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for ThemeStore {
    async fn save_one(&self, theme: &mut Theme) -> Result<()> {
        theme
            .validate()
            .map_err(|e| DatabaseError::InvalidInput(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        sqlx::query(&format!(
            "INSERT INTO themes ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&id)
        .bind(&theme.name)
        .bind(&theme.author)
        .bind(&theme.description)
        .bind(&theme.url)
        .bind(&theme.hash)
        .bind(theme.light)
        .bind(&theme.version)
        .bind(&theme.project_repo_id)
        .bind(&theme.project_repo)
        .bind(&theme.readme)
        .bind(&theme.license)
        .bind(theme.provider.as_str())
        .bind(encode_timestamp(theme.last_update))
        .execute(self.db.pool())
        .await?;

        theme.id = id;
        Ok(())
    }

    async fn save_batch(&self, themes: &mut [Theme]) -> Result<()> {
        if themes.is_empty() {
            return Ok(());
        }

        for theme in themes.iter_mut() {
            theme.id = Uuid::new_v4().to_string();
        }

        match self.insert_batch(themes).await {
            Ok(()) => {
                tracing::info!(operation = "save_batch", count = themes.len(), "themes saved");
                Ok(())
            }
            Err(e) => {
                for theme in themes.iter_mut() {
                    theme.id.clear();
                }
                tracing::error!(operation = "save_batch", error = %e, "batch rolled back");
                Err(e)
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Theme> {
        if id.is_empty() {
            return Err(DatabaseError::NotFound("theme with empty id".to_string()));
        }

        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM themes WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("theme {id}")))?;

        theme_from_row(&row)
    }

    async fn update(&self, theme: &Theme) -> Result<()> {
        if theme.id.is_empty() {
            return Err(DatabaseError::NotFound("theme with empty id".to_string()));
        }
        theme
            .validate()
            .map_err(|e| DatabaseError::InvalidInput(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE themes SET name = ?, author = ?, description = ?, url = ?, hash = ?, light = ?, \
             version = ?, project_repo_id = ?, project_repo = ?, readme = ?, license = ?, \
             provider = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&theme.name)
        .bind(&theme.author)
        .bind(&theme.description)
        .bind(&theme.url)
        .bind(&theme.hash)
        .bind(theme.light)
        .bind(&theme.version)
        .bind(&theme.project_repo_id)
        .bind(&theme.project_repo)
        .bind(&theme.readme)
        .bind(&theme.license)
        .bind(theme.provider.as_str())
        .bind(encode_timestamp(theme.last_update))
        .bind(&theme.id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("theme {}", theme.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM themes WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("theme {id}")));
        }
        Ok(())
    }

    async fn list(&self, filter: Option<ListFilter>) -> Result<Gallery> {
        let filter = filter.unwrap_or_default();
        // SQLite reads a negative LIMIT as unbounded
        let limit: i64 = if filter.limit > 0 { i64::from(filter.limit) } else { -1 };

        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM themes ORDER BY name, id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(i64::from(filter.offset))
        .fetch_all(self.db.pool())
        .await?;

        collect_gallery(&rows)
    }
}

fn encode_timestamp(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(|t| t.to_rfc3339())
}

fn theme_from_row(row: &SqliteRow) -> Result<Theme> {
    let updated_at: Option<String> = row.try_get("updated_at")?;
    let last_update = updated_at
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| DatabaseError::Decode(format!("updated_at '{raw}': {e}")))
        })
        .transpose()?;

    let provider: String = row.try_get("provider")?;

    Ok(Theme {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        author: row.try_get("author")?,
        description: row.try_get("description")?,
        url: row.try_get("url")?,
        hash: row.try_get("hash")?,
        light: row.try_get("light")?,
        version: row.try_get("version")?,
        project_repo_id: row.try_get("project_repo_id")?,
        project_repo: row.try_get("project_repo")?,
        readme: row.try_get("readme")?,
        license: row.try_get("license")?,
        provider: ProviderName::from(provider),
        last_update,
    })
}

fn collect_gallery(rows: &[SqliteRow]) -> Result<Gallery> {
    let mut gallery = Gallery::new();
    for row in rows {
        gallery.accept(theme_from_row(row)?);
    }
    Ok(gallery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{repository_hash, ProjectRepository};
    use chrono::TimeZone;

    async fn store() -> ThemeStore {
        let store = ThemeStore::new(SqliteDatabase::in_memory().await.unwrap());
        store.migrate().await.unwrap();
        store
    }

    fn theme(name: &str) -> Theme {
        Theme::new(name, format!("https://example.com/{name}.tmTheme"), "tmTheme-editor")
    }

    #[tokio::test]
    async fn test_save_one_assigns_id() {
        let store = store().await;
        let mut t = theme("Monokai")
            .with_author("Wimer Hazenberg")
            .with_version("1.2.0")
            .with_project_repository(&ProjectRepository::new("owner", "monokai"))
            .with_last_update(Some(Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap()));

        store.save_one(&mut t).await.unwrap();
        assert!(t.is_saved());

        let loaded = store.get(&t.id).await.unwrap();
        assert_eq!(loaded, t);
    }

    #[tokio::test]
    async fn test_save_one_rejects_invalid() {
        let store = store().await;
        let mut t = theme("");

        let err = store.save_one(&mut t).await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));
        assert!(!t.is_saved());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_batch_assigns_unique_ids() {
        let store = store().await;
        let mut themes: Vec<Theme> = (0..150).map(|i| theme(&format!("Theme {i:03}"))).collect();

        store.save_batch(&mut themes).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 150);
        let mut ids: Vec<&str> = themes.iter().map(|t| t.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 150);
        assert!(ids.iter().all(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn test_save_batch_is_all_or_nothing() {
        let store = store().await;
        let mut themes = vec![theme("A"), Theme::new("", "https://example.com/x", "p"), theme("C")];

        let err = store.save_batch(&mut themes).await.unwrap_err();

        assert!(matches!(err, DatabaseError::IncompleteBatch { expected: 3, inserted: 2 }));
        assert!(themes.iter().all(|t| t.id.is_empty()));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_empty_batch() {
        let store = store().await;
        store.save_batch(&mut []).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_window() {
        let store = store().await;
        let mut themes = vec![theme("D"), theme("B"), theme("A"), theme("C")];
        store.save_batch(&mut themes).await.unwrap();

        let all = store.list(None).await.unwrap();
        let names: Vec<&str> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);

        let page = store.list(Some(ListFilter::new(2, 1))).await.unwrap();
        let names: Vec<&str> = page.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);

        let tail = store.list(Some(ListFilter::new(0, 3))).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].name, "D");
    }

    #[tokio::test]
    async fn test_update_keeps_id() {
        let store = store().await;
        let mut t = theme("Old");
        store.save_one(&mut t).await.unwrap();
        let id = t.id.clone();

        t.name = "New".to_string();
        t.light = true;
        t.license = Some("MIT".to_string());
        store.update(&t).await.unwrap();

        let loaded = store.get(&id).await.unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.name, "New");
        assert!(loaded.light);
        assert_eq!(loaded.license.as_deref(), Some("MIT"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let store = store().await;

        let unsaved = theme("A");
        assert!(store.update(&unsaved).await.unwrap_err().is_not_found());

        let mut absent = theme("B");
        absent.id = "no-such-id".to_string();
        assert!(store.update(&absent).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let store = store().await;
        let mut t = theme("A");
        store.save_one(&mut t).await.unwrap();

        store.delete(&t.id).await.unwrap();
        assert!(store.delete(&t.id).await.unwrap_err().is_not_found());
        assert!(store.get(&t.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_get_empty_id() {
        let store = store().await;
        assert!(store.get("").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_repository() {
        let store = store().await;
        let repo = ProjectRepository::new("owner", "themes");
        let mut themes = vec![
            theme("Z").with_project_repository(&repo),
            theme("Y"),
            Theme::new("X", "https://other/x", "Github").with_project_repository(&repo),
        ];
        store.save_batch(&mut themes).await.unwrap();

        let shared = store
            .list_by_repository(&repository_hash("https://github.com/owner/themes"))
            .await
            .unwrap();
        let names: Vec<&str> = shared.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["X", "Z"]);

        assert!(store.list_by_repository("").await.unwrap().is_empty());
    }
}
