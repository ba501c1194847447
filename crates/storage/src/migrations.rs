//! Embedded schema migrations for the theme catalog

use crate::database::MigrationDefinition;

const CREATE_THEMES: &str = "CREATE TABLE IF NOT EXISTS themes (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL CHECK (name <> ''),
    author TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL CHECK (url <> ''),
    hash TEXT NOT NULL DEFAULT '',
    light INTEGER NOT NULL DEFAULT 0,
    version TEXT,
    project_repo_id TEXT NOT NULL DEFAULT '',
    project_repo TEXT NOT NULL DEFAULT '',
    readme TEXT NOT NULL DEFAULT '',
    license TEXT,
    provider TEXT NOT NULL DEFAULT '',
    updated_at TEXT
)";

const INDEX_NAME: &str = "CREATE INDEX IF NOT EXISTS idx_themes_name ON themes (name)";

const INDEX_REPOSITORY: &str =
    "CREATE INDEX IF NOT EXISTS idx_themes_project_repo_id ON themes (project_repo_id)";

/// Theme catalog migrations in version order
pub fn theme_migrations() -> Vec<MigrationDefinition> {
    vec![
        MigrationDefinition::new(1, "Create themes table", CREATE_THEMES),
        MigrationDefinition::new(2, "Index themes by name", INDEX_NAME),
        MigrationDefinition::new(3, "Index themes by project repository", INDEX_REPOSITORY),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteDatabase;

    #[test]
    fn test_versions_are_ascending() {
        let versions: Vec<i64> = theme_migrations().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_schema_applies() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.migrate(&theme_migrations()).await.unwrap();
        db.migrate(&theme_migrations()).await.unwrap();

        assert_eq!(db.current_version().await.unwrap(), 3);

        let indexes: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='themes' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert!(indexes.contains(&"idx_themes_name".to_string()));
        assert!(indexes.contains(&"idx_themes_project_repo_id".to_string()));
    }
}
